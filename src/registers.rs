//! Register map, command opcodes and configuration encodings.
//!
//! Values follow the ADS1255/ADS1256 datasheet, Table 23 (register map) and
//! Table 24 (command definitions).

/// Factory identification nibble reported in bits 7-4 of STATUS.
pub const CHIP_ID: u8 = 3;

/// Register addresses, in datasheet order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    Status = 0x00,
    Mux = 0x01,
    Adcon = 0x02,
    Drate = 0x03,
    Io = 0x04,
    Ofc0 = 0x05,
    Ofc1 = 0x06,
    Ofc2 = 0x07,
    Fsc0 = 0x08,
    Fsc1 = 0x09,
    Fsc2 = 0x0A,
}

impl Register {
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

/// Single-byte command opcodes. RREG and WREG carry the start address in
/// their low nibble, see [`Command::read_header`] and [`Command::write_header`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    /// Completes SYNC and exits standby
    Wakeup = 0x00,
    /// Read a single conversion
    ReadData = 0x01,
    /// Read conversions continuously
    ReadDataContinuous = 0x03,
    /// Stop continuous read mode
    StopReadDataContinuous = 0x0F,
    ReadRegister = 0x10,
    WriteRegister = 0x50,
    SelfCalibrate = 0xF0,
    SelfOffsetCalibrate = 0xF1,
    SelfGainCalibrate = 0xF2,
    SystemOffsetCalibrate = 0xF3,
    SystemGainCalibrate = 0xF4,
    /// Synchronize the A/D conversion
    Sync = 0xFC,
    Standby = 0xFD,
    /// Reset registers to power-up values
    Reset = 0xFE,
}

impl Command {
    pub const fn opcode(self) -> u8 {
        self as u8
    }

    /// `[RREG | addr, count - 1]`
    ///
    /// `count` must be between 1 and 16; it is clamped into that range.
    pub const fn read_header(start: Register, count: u8) -> [u8; 2] {
        [
            Command::ReadRegister.opcode() | start.addr(),
            count_byte(count),
        ]
    }

    /// `[WREG | addr, count - 1]`
    ///
    /// `count` must be between 1 and 16; it is clamped into that range.
    pub const fn write_header(start: Register, count: u8) -> [u8; 2] {
        [
            Command::WriteRegister.opcode() | start.addr(),
            count_byte(count),
        ]
    }
}

const fn count_byte(count: u8) -> u8 {
    let count = if count == 0 {
        1
    } else if count > 16 {
        16
    } else {
        count
    };
    count - 1
}

/// The self and system calibration variants the chip offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Calibration {
    /// Offset and gain self-calibration
    SelfFull,
    SelfOffset,
    SelfGain,
    SystemOffset,
    SystemGain,
}

impl Calibration {
    pub const fn command(self) -> Command {
        match self {
            Self::SelfFull => Command::SelfCalibrate,
            Self::SelfOffset => Command::SelfOffsetCalibrate,
            Self::SelfGain => Command::SelfGainCalibrate,
            Self::SystemOffset => Command::SystemOffsetCalibrate,
            Self::SystemGain => Command::SystemGainCalibrate,
        }
    }
}

/// Programmable gain amplifier setting (ADCON bits 2-0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Gain {
    X1 = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
    X32 = 5,
    X64 = 6,
}

impl Gain {
    pub const fn bits(self) -> u8 {
        self as u8
    }

    pub const fn multiplier(self) -> u8 {
        1 << (self as u8)
    }

    /// Decodes ADCON bits 2-0. The chip treats `0b111` as ×64 too.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0 => Self::X1,
            1 => Self::X2,
            2 => Self::X4,
            3 => Self::X8,
            4 => Self::X16,
            5 => Self::X32,
            _ => Self::X64,
        }
    }
}

/// Output data rate. Each variant's [`DataRate::code`] is the DRATE byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataRate {
    /// Power-up default
    Sps30000,
    Sps15000,
    Sps7500,
    Sps3750,
    Sps2000,
    Sps1000,
    Sps500,
    Sps100,
    Sps60,
    Sps50,
    Sps30,
    Sps25,
    Sps15,
    Sps10,
    Sps5,
    Sps2_5,
}

impl DataRate {
    pub const ALL: [DataRate; 16] = [
        Self::Sps30000,
        Self::Sps15000,
        Self::Sps7500,
        Self::Sps3750,
        Self::Sps2000,
        Self::Sps1000,
        Self::Sps500,
        Self::Sps100,
        Self::Sps60,
        Self::Sps50,
        Self::Sps30,
        Self::Sps25,
        Self::Sps15,
        Self::Sps10,
        Self::Sps5,
        Self::Sps2_5,
    ];

    pub const fn code(self) -> u8 {
        match self {
            Self::Sps30000 => 0xF0,
            Self::Sps15000 => 0xE0,
            Self::Sps7500 => 0xD0,
            Self::Sps3750 => 0xC0,
            Self::Sps2000 => 0xB0,
            Self::Sps1000 => 0xA1,
            Self::Sps500 => 0x92,
            Self::Sps100 => 0x82,
            Self::Sps60 => 0x72,
            Self::Sps50 => 0x63,
            Self::Sps30 => 0x53,
            Self::Sps25 => 0x43,
            Self::Sps15 => 0x33,
            Self::Sps10 => 0x20,
            Self::Sps5 => 0x13,
            Self::Sps2_5 => 0x03,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|rate| rate.code() == code)
    }
}

/// How the input multiplexer pairs the analog inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanMode {
    /// AINx against AINCOM, up to eight channels
    SingleEnded,
    /// AIN0/1, AIN2/3, AIN4/5, AIN6/7
    Differential,
}

impl ScanMode {
    /// Highest channel count the mode can address
    pub const fn max_channels(self) -> u8 {
        match self {
            Self::SingleEnded => 8,
            Self::Differential => 4,
        }
    }

    /// MUX register value selecting `channel`, or `None` when the channel
    /// does not exist in this mode.
    pub const fn mux(self, channel: u8) -> Option<u8> {
        match self {
            Self::SingleEnded if channel < 8 => Some((channel << 4) | MUX_AINCOM),
            Self::Differential if channel < 4 => Some(DIFFERENTIAL_PAIRS[channel as usize]),
            _ => None,
        }
    }
}

/// PSEL3/NSEL3 set selects AINCOM.
const MUX_AINCOM: u8 = 1 << 3;

const DIFFERENTIAL_PAIRS: [u8; 4] = [0x01, 0x23, 0x45, 0x67];

/// STATUS bit 2: auto-calibration on PGA/DRATE/BUFEN change
pub const STATUS_ACAL: u8 = 1 << 2;
/// STATUS bit 1: analog input buffer
pub const STATUS_BUFEN: u8 = 1 << 1;

/// Extracts the factory ID from a STATUS register value.
pub const fn status_id(status: u8) -> u8 {
    status >> 4
}
