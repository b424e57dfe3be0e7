//! This driver is based on the datasheet which can be found here:
//! https://www.ti.com/lit/ds/symlink/ads1256.pdf

use embedded_hal::{
    delay::DelayNs,
    digital::{self, InputPin, OutputPin},
    spi::SpiBus,
};

use crate::{
    config::{DeviceConfig, Timing},
    error::Error,
    poll::Readiness,
    registers::{status_id, Calibration, Command, Register, CHIP_ID},
    sample::{decode_conversion, ChannelSample, Scan},
};

/// Byte clocked out while reading, matching the idle level of DIN.
const READ_FILLER: u8 = 0xFF;

/// Where the engine is in its per-channel cycle. Anything but `Idle` is only
/// observable if a bus error interrupted the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionState {
    Idle,
    WaitReady,
    SelectChannel,
    Synchronize,
    Wake,
    ReadConversion,
}

/// Result of comparing the STATUS factory ID with [`CHIP_ID`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Identity {
    Match,
    /// The bus answered with something other than an ADS1256. The driver
    /// keeps running; conversions are likely garbage.
    Mismatch { id: u8 },
}

pub struct Ads1256<SPI, CS, DRDY>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    DRDY: InputPin,
{
    spi: SPI,
    cs: CS,
    drdy: DRDY,
    config: DeviceConfig,
    timing: Timing,
    /// Channel currently routed through the input multiplexer
    selected: u8,
    state: AcquisitionState,
    timeouts: u32,
}

impl<SPI, CS, DRDY> Ads1256<SPI, CS, DRDY>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    DRDY: InputPin,
{
    pub fn new(spi: SPI, cs: CS, drdy: DRDY, config: DeviceConfig) -> Self {
        Self {
            spi,
            cs,
            drdy,
            config,
            timing: Timing::default(),
            selected: 0,
            state: AcquisitionState::Idle,
            timeouts: 0,
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Channel whose conversion completes at the next DRDY.
    pub fn selected_channel(&self) -> u8 {
        self.selected
    }

    /// DRDY polls that hit the attempt ceiling since construction.
    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }

    pub fn release(self) -> (SPI, CS, DRDY) {
        (self.spi, self.cs, self.drdy)
    }

    /// Brings the converter up: identity check, RESET, configuration write
    /// and an offset self-calibration. Leaves AIN0 (or the first differential
    /// pair) selected.
    ///
    /// An identity mismatch is logged and returned, not treated as an error.
    pub fn init(&mut self, delay: &mut impl DelayNs) -> Result<Identity, Error<SPI::Error>> {
        let identity = self.read_identity(delay)?;

        self.reset(delay)?;
        self.configure(delay)?;
        self.self_calibrate(delay, Calibration::SelfOffset)?;

        Ok(identity)
    }

    /// Waits for DRDY, reads STATUS and compares its ID nibble.
    pub fn read_identity(
        &mut self,
        delay: &mut impl DelayNs,
    ) -> Result<Identity, Error<SPI::Error>> {
        self.wait_ready(delay)?;
        let id = status_id(self.read_register(delay, Register::Status)?);

        if id == CHIP_ID {
            info!("ADS1256 found, chip ID {}", id);
            Ok(Identity::Match)
        } else {
            warn!("unexpected chip ID {} (expected {})", id, CHIP_ID);
            Ok(Identity::Mismatch { id })
        }
    }

    /// Writes STATUS, MUX, ADCON and DRATE in a single transaction once DRDY
    /// is low, then waits for the configuration to settle.
    pub fn configure(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<SPI::Error>> {
        self.wait_ready(delay)?;

        let block = self.config.register_block();
        self.write_registers(delay, Register::Status, &block)?;
        delay.delay_us(self.timing.config_settle_us);

        // The block routes AIN0 against AINCOM; differential scans start on
        // their first pair instead.
        self.selected = 0;
        if let Some(mux) = self.config.scan_mode.mux(0) {
            if mux != block[1] {
                self.write_register(delay, Register::Mux, mux)?;
            }
        }

        Ok(())
    }

    /// Polls DRDY up to the configured ceiling. A timeout is logged and
    /// counted; the caller decides whether to go on.
    pub fn wait_ready(&mut self, delay: &mut impl DelayNs) -> Result<Readiness, Error<SPI::Error>> {
        let drdy = &mut self.drdy;
        let readiness = self
            .timing
            .ready
            .poll(delay, || drdy.is_low())
            .map_err(Self::pin_error)?;

        if let Readiness::NotReady { attempts } = readiness {
            self.timeouts = self.timeouts.wrapping_add(1);
            warn!(
                "DRDY not asserted after {} polls (channel {})",
                attempts, self.selected
            );
        }

        Ok(readiness)
    }

    /// Sends a single-byte command in its own chip-select frame.
    pub fn command(
        &mut self,
        delay: &mut impl DelayNs,
        command: Command,
    ) -> Result<(), Error<SPI::Error>> {
        self.frame(|ads| ads.send(delay, command.opcode()))
    }

    /// Resets every register to its power-up value and waits for DRDY.
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<Readiness, Error<SPI::Error>> {
        self.command(delay, Command::Reset)?;
        self.selected = 0;
        self.wait_ready(delay)
    }

    /// Starts a calibration and waits for DRDY to signal its completion.
    pub fn self_calibrate(
        &mut self,
        delay: &mut impl DelayNs,
        calibration: Calibration,
    ) -> Result<Readiness, Error<SPI::Error>> {
        self.command(delay, calibration.command())?;
        self.wait_ready(delay)
    }

    pub fn standby(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<SPI::Error>> {
        self.command(delay, Command::Standby)
    }

    pub fn wakeup(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<SPI::Error>> {
        self.command(delay, Command::Wakeup)
    }

    pub fn sync(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<SPI::Error>> {
        self.command(delay, Command::Sync)
    }

    /// Enters continuous read mode. [`Ads1256::acquire`] must not be used
    /// until [`Ads1256::stop_continuous`] has been sent.
    pub fn start_continuous(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<SPI::Error>> {
        self.command(delay, Command::ReadDataContinuous)
    }

    pub fn stop_continuous(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<SPI::Error>> {
        self.command(delay, Command::StopReadDataContinuous)
    }

    pub fn write_register(
        &mut self,
        delay: &mut impl DelayNs,
        register: Register,
        value: u8,
    ) -> Result<(), Error<SPI::Error>> {
        self.write_registers(delay, register, &[value])
    }

    /// `[WREG | start][len - 1][values...]` in one chip-select frame.
    /// `values` holds at most 16 bytes; anything beyond that is not sent.
    pub fn write_registers(
        &mut self,
        delay: &mut impl DelayNs,
        start: Register,
        values: &[u8],
    ) -> Result<(), Error<SPI::Error>> {
        let values = &values[..values.len().min(16)];
        if values.is_empty() {
            return Ok(());
        }

        let header = Command::write_header(start, values.len() as u8);
        self.frame(|ads| {
            for byte in header.iter().chain(values) {
                ads.send(delay, *byte)?;
            }
            Ok(())
        })
    }

    pub fn read_register(
        &mut self,
        delay: &mut impl DelayNs,
        register: Register,
    ) -> Result<u8, Error<SPI::Error>> {
        let mut value = [0];
        self.read_registers(delay, register, &mut value)?;
        Ok(value[0])
    }

    /// `[RREG | start][len - 1]`, turnaround delay, then `buf.len()` bytes.
    /// At most 16 registers are read.
    pub fn read_registers(
        &mut self,
        delay: &mut impl DelayNs,
        start: Register,
        buf: &mut [u8],
    ) -> Result<(), Error<SPI::Error>> {
        let len = buf.len().min(16);
        if len == 0 {
            return Ok(());
        }

        let header = Command::read_header(start, len as u8);
        let turnaround = self.timing.turnaround_us;
        self.frame(|ads| {
            for byte in header {
                ads.send(delay, byte)?;
            }
            delay.delay_us(turnaround);
            for slot in buf[..len].iter_mut() {
                *slot = ads.receive()?;
            }
            Ok(())
        })
    }

    /// Routes `channel` through the input multiplexer and waits for the mux
    /// to settle. Channels the scan mode cannot address are rejected before
    /// anything is sent.
    pub fn select_channel(
        &mut self,
        delay: &mut impl DelayNs,
        channel: u8,
    ) -> Result<(), Error<SPI::Error>> {
        let Some(mux) = self.config.scan_mode.mux(channel) else {
            return Err(Error::Channel(channel));
        };

        self.write_register(delay, Register::Mux, mux)?;
        self.selected = channel;
        delay.delay_us(self.timing.mux_settle_us);
        Ok(())
    }

    /// RDATA, turnaround delay, three bytes of big-endian two's complement.
    pub fn read_conversion(&mut self, delay: &mut impl DelayNs) -> Result<i32, Error<SPI::Error>> {
        let turnaround = self.timing.turnaround_us;
        let bytes = self.frame(|ads| {
            ads.send(delay, Command::ReadData.opcode())?;
            delay.delay_us(turnaround);

            let mut bytes = [0u8; 3];
            for byte in bytes.iter_mut() {
                *byte = ads.receive()?;
            }
            Ok(bytes)
        })?;

        Ok(decode_conversion(bytes))
    }

    /// Runs one channel slot of the scan cycle and advances to the next
    /// channel, wrapping after the last configured one.
    ///
    /// The data register always holds the conversion that completed at DRDY,
    /// which belongs to the channel selected before this call. The returned
    /// sample is tagged with that channel while the next one starts converting
    /// (datasheet figure 19, "Cycling the ADS1256 Input Multiplexer").
    pub fn acquire(
        &mut self,
        delay: &mut impl DelayNs,
    ) -> Result<ChannelSample, Error<SPI::Error>> {
        let result = self.acquire_slot(delay);
        self.state = AcquisitionState::Idle;
        result
    }

    fn acquire_slot(
        &mut self,
        delay: &mut impl DelayNs,
    ) -> Result<ChannelSample, Error<SPI::Error>> {
        let converted = self.selected;
        let next = (converted + 1) % self.config.channel_count();

        self.state = AcquisitionState::WaitReady;
        let readiness = self.wait_ready(delay)?;

        self.state = AcquisitionState::SelectChannel;
        self.select_channel(delay, next)?;

        self.state = AcquisitionState::Synchronize;
        self.command(delay, Command::Sync)?;
        delay.delay_us(self.timing.sync_settle_us);

        self.state = AcquisitionState::Wake;
        self.command(delay, Command::Wakeup)?;
        delay.delay_us(self.timing.wake_settle_us);

        self.state = AcquisitionState::ReadConversion;
        let raw = self.read_conversion(delay)?;

        Ok(ChannelSample {
            channel: converted,
            raw,
            stale: !readiness.is_ready(),
        })
    }

    /// One pass over every configured channel, spaced by the channel spacing
    /// delay.
    pub fn scan(&mut self, delay: &mut impl DelayNs) -> Result<Scan, Error<SPI::Error>> {
        let mut scan = Scan::empty();
        for _ in 0..self.config.channel_count() {
            let sample = self.acquire(delay)?;
            scan.insert(sample);
            delay.delay_us(self.timing.channel_spacing_us);
        }
        Ok(scan)
    }

    /// Runs `f` with chip select asserted. The bus is flushed before chip
    /// select is released, and it is released even if `f` fails.
    fn frame<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, Error<SPI::Error>>,
    ) -> Result<R, Error<SPI::Error>> {
        self.cs.set_low().map_err(Self::pin_error)?;
        let result = f(self).and_then(|value| {
            self.spi.flush().map_err(Error::Spi)?;
            Ok(value)
        });
        self.cs.set_high().map_err(Self::pin_error)?;
        result
    }

    fn pin_error(err: impl digital::Error) -> Error<SPI::Error> {
        Error::pin(err)
    }

    /// Clocks out one byte and waits for it to leave the bus, so every delay
    /// that follows is measured from the last SCLK edge.
    fn send(&mut self, delay: &mut impl DelayNs, byte: u8) -> Result<(), Error<SPI::Error>> {
        delay.delay_us(self.timing.byte_gap_us);
        self.spi.write(&[byte]).map_err(Error::Spi)?;
        self.spi.flush().map_err(Error::Spi)
    }

    fn receive(&mut self) -> Result<u8, Error<SPI::Error>> {
        let mut byte = [READ_FILLER];
        self.spi.transfer_in_place(&mut byte).map_err(Error::Spi)?;
        Ok(byte[0])
    }
}
