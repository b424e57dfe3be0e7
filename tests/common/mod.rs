#![allow(dead_code)]

use std::{cell::RefCell, collections::VecDeque, convert::Infallible, rc::Rc};

use ads1256_meter::{
    Ads1256, CalibrationOffsets, CurrentEstimate, DeviceConfig, OffsetStore, SampleSink,
};
use embedded_hal::{
    digital::{self, InputPin, OutputPin},
    spi::{self, SpiBus},
};

pub const RESET: u8 = 0xFE;
pub const SYNC: u8 = 0xFC;
pub const WAKEUP: u8 = 0x00;
pub const RDATA: u8 = 0x01;
pub const SELFOCAL: u8 = 0xF1;

/// Power-up values of STATUS..FSC2, ID nibble excluded.
const POWER_UP: [u8; 11] = [0x01, 0x01, 0x20, 0xF0, 0xE0, 0, 0, 0, 0, 0, 0x40];

enum Parse {
    Opcode,
    WriteCount { start: usize },
    Write { next: usize, remaining: usize },
    ReadCount { start: usize },
    Output(VecDeque<u8>),
}

/// Register-level model of an ADS1256 behind a chip-select line.
///
/// The data register follows the multiplexer pipeline: WAKEUP latches the
/// conversion of the channel that was converting, then starts converting
/// whatever MUX selects now.
pub struct Chip {
    pub registers: [u8; 11],
    pub id: u8,
    /// Opcodes received, in order
    pub commands: Vec<u8>,
    /// Every value written to MUX
    pub mux_writes: Vec<u8>,
    /// Value each channel converts to once its queue is empty
    pub levels: [i32; 8],
    pub queued: [VecDeque<i32>; 8],
    pub drdy_stuck: bool,
    pub frames: usize,
    converting: usize,
    output: i32,
    parse: Parse,
}

impl Chip {
    pub fn new(id: u8) -> Self {
        let mut chip = Self {
            registers: POWER_UP,
            id,
            commands: Vec::new(),
            mux_writes: Vec::new(),
            levels: [0; 8],
            queued: Default::default(),
            drdy_stuck: false,
            frames: 0,
            converting: 0,
            output: 0,
            parse: Parse::Opcode,
        };
        chip.reset();
        chip
    }

    pub fn set_levels(&mut self, levels: &[i32]) {
        self.levels[..levels.len()].copy_from_slice(levels);
    }

    pub fn count(&self, opcode: u8) -> usize {
        self.commands.iter().filter(|c| **c == opcode).count()
    }

    fn reset(&mut self) {
        self.registers = POWER_UP;
        self.registers[0] |= self.id << 4;
        self.converting = self.mux_channel();
    }

    fn mux_channel(&self) -> usize {
        usize::from(self.registers[1] >> 4)
    }

    fn conversion(&mut self, channel: usize) -> i32 {
        self.queued[channel]
            .pop_front()
            .unwrap_or(self.levels[channel])
    }

    fn write_byte(&mut self, byte: u8) {
        self.parse = match std::mem::replace(&mut self.parse, Parse::Opcode) {
            Parse::Opcode => self.opcode(byte),
            Parse::WriteCount { start } => Parse::Write {
                next: start,
                remaining: usize::from(byte) + 1,
            },
            Parse::Write { next, remaining } => {
                if next == 0 {
                    // ID bits are read-only
                    self.registers[0] = (self.id << 4) | (byte & 0x0F);
                } else if next < self.registers.len() {
                    self.registers[next] = byte;
                }
                if next == 1 {
                    self.mux_writes.push(byte);
                }
                if remaining > 1 {
                    Parse::Write {
                        next: next + 1,
                        remaining: remaining - 1,
                    }
                } else {
                    Parse::Opcode
                }
            }
            Parse::ReadCount { start } => {
                let end = (start + usize::from(byte) + 1).min(self.registers.len());
                Parse::Output(self.registers[start..end].iter().copied().collect())
            }
            output @ Parse::Output(_) => output,
        };
    }

    fn opcode(&mut self, byte: u8) -> Parse {
        self.commands.push(byte);
        match byte {
            0x50..=0x5F => Parse::WriteCount {
                start: usize::from(byte & 0x0F),
            },
            0x10..=0x1F => Parse::ReadCount {
                start: usize::from(byte & 0x0F),
            },
            RDATA => {
                let bytes = (self.output as u32 & 0xFF_FFFF).to_be_bytes();
                Parse::Output(bytes[1..].iter().copied().collect())
            }
            WAKEUP => {
                self.output = self.conversion(self.converting);
                self.converting = self.mux_channel();
                Parse::Opcode
            }
            RESET => {
                self.reset();
                Parse::Opcode
            }
            _ => Parse::Opcode,
        }
    }

    fn read_byte(&mut self) -> u8 {
        match &mut self.parse {
            Parse::Output(bytes) => bytes.pop_front().unwrap_or(0xFF),
            _ => 0xFF,
        }
    }

    fn end_frame(&mut self) {
        self.frames += 1;
        self.parse = Parse::Opcode;
    }
}

pub type Shared = Rc<RefCell<Chip>>;

pub struct FakeSpi(pub Shared);
pub struct FakeCs(pub Shared);
pub struct FakeDrdy(pub Shared);

impl spi::ErrorType for FakeSpi {
    type Error = Infallible;
}

impl SpiBus<u8> for FakeSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        let mut chip = self.0.borrow_mut();
        for word in words {
            *word = chip.read_byte();
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
        let mut chip = self.0.borrow_mut();
        for word in words {
            chip.write_byte(*word);
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Infallible> {
        self.write(write)?;
        self.read(read)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        self.read(words)
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

impl digital::ErrorType for FakeCs {
    type Error = Infallible;
}

impl OutputPin for FakeCs {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().end_frame();
        Ok(())
    }
}

impl digital::ErrorType for FakeDrdy {
    type Error = Infallible;
}

impl InputPin for FakeDrdy {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.borrow().drdy_stuck)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.borrow().drdy_stuck)
    }
}

pub type FakeAds = Ads1256<FakeSpi, FakeCs, FakeDrdy>;

pub fn fake_ads(id: u8, config: DeviceConfig) -> (FakeAds, Shared) {
    let chip = Rc::new(RefCell::new(Chip::new(id)));
    let ads = Ads1256::new(
        FakeSpi(chip.clone()),
        FakeCs(chip.clone()),
        FakeDrdy(chip.clone()),
        config,
    );
    (ads, chip)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refused;

/// Estimates kept in memory, one `Vec` per opened bucket.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub buckets: Vec<Vec<CurrentEstimate>>,
    pub refuse: bool,
}

impl MemorySink {
    pub fn estimates(&self) -> Vec<CurrentEstimate> {
        self.buckets.iter().flatten().copied().collect()
    }
}

impl SampleSink for MemorySink {
    type Error = Refused;

    fn open_bucket(&mut self) -> Result<(), Refused> {
        if self.refuse {
            return Err(Refused);
        }
        self.buckets.push(Vec::new());
        Ok(())
    }

    fn append(&mut self, estimate: CurrentEstimate) -> Result<(), Refused> {
        if self.refuse {
            return Err(Refused);
        }
        match self.buckets.last_mut() {
            Some(bucket) => bucket.push(estimate),
            None => self.buckets.push(vec![estimate]),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub offsets: Option<CalibrationOffsets>,
    pub saves: usize,
    pub refuse: bool,
}

impl MemoryStore {
    pub fn with(offsets: CalibrationOffsets) -> Self {
        Self {
            offsets: Some(offsets),
            ..Self::default()
        }
    }
}

impl OffsetStore for MemoryStore {
    type Error = Refused;

    fn load(&mut self) -> Result<Option<CalibrationOffsets>, Refused> {
        if self.refuse {
            return Err(Refused);
        }
        Ok(self.offsets)
    }

    fn save(&mut self, offsets: &CalibrationOffsets) -> Result<(), Refused> {
        if self.refuse {
            return Err(Refused);
        }
        self.offsets = Some(*offsets);
        self.saves += 1;
        Ok(())
    }
}
