//! The outer acquisition loop: scan, calibrate or fuse, append.

use core::convert::Infallible;

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::SpiBus,
};

use crate::{
    calibration::{CalibrationOffsets, CalibrationStage, Progress, CALIBRATION_SCANS},
    driver::{Ads1256, Identity},
    error::Error,
    fusion::{fuse, CurrentEstimate, RANGE_COUNT},
};

/// Destination of the per-cycle current estimates.
pub trait SampleSink {
    type Error;

    /// Starts a new output bucket; later estimates land in it.
    fn open_bucket(&mut self) -> Result<(), Self::Error>;

    fn append(&mut self, estimate: CurrentEstimate) -> Result<(), Self::Error>;
}

/// Persistent home of the calibration offsets.
pub trait OffsetStore {
    type Error;

    /// `Ok(None)` means no calibration has been recorded yet.
    fn load(&mut self) -> Result<Option<CalibrationOffsets>, Self::Error>;

    fn save(&mut self, offsets: &CalibrationOffsets) -> Result<(), Self::Error>;
}

#[derive(Debug, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeterError<E, S> {
    #[error("converter: {0}")]
    Device(Error<E>),
    /// Opening, writing or reading the sample log or calibration record
    /// failed. The meter cannot go on without them.
    #[error("storage: {0}")]
    Storage(S),
    #[error("{configured} channels configured, range fusion needs three")]
    TooFewChannels { configured: u8 },
}

impl<E, S> From<Error<E>> for MeterError<E, S> {
    fn from(err: Error<E>) -> Self {
        Self::Device(err)
    }
}

/// What one call to [`Meter::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cycle {
    Calibrating { scans: u32 },
    /// The scan completed calibration; offsets are saved and a fresh bucket
    /// is open
    Calibrated(CalibrationOffsets),
    Measured(CurrentEstimate),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stats {
    pub cycles: u64,
    pub estimates: u64,
    /// Samples read after a DRDY timeout
    pub stale_samples: u64,
}

/// Owns the converter, the sample sink and the offset store for the life of
/// the process.
pub struct Meter<SPI, CS, DRDY, K, O>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    DRDY: InputPin,
    K: SampleSink,
    O: OffsetStore<Error = K::Error>,
{
    adc: Ads1256<SPI, CS, DRDY>,
    sink: K,
    store: O,
    stage: CalibrationStage,
    stats: Stats,
}

type StepError<SPI, K> =
    MeterError<<SPI as embedded_hal::spi::ErrorType>::Error, <K as SampleSink>::Error>;

impl<SPI, CS, DRDY, K, O> Meter<SPI, CS, DRDY, K, O>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    DRDY: InputPin,
    K: SampleSink,
    O: OffsetStore<Error = K::Error>,
{
    pub fn new(adc: Ads1256<SPI, CS, DRDY>, sink: K, store: O) -> Self {
        Self {
            adc,
            sink,
            store,
            stage: CalibrationStage::Off,
            stats: Stats::default(),
        }
    }

    pub fn adc(&self) -> &Ads1256<SPI, CS, DRDY> {
        &self.adc
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn store(&self) -> &O {
        &self.store
    }

    pub fn stage(&self) -> &CalibrationStage {
        &self.stage
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn release(self) -> (Ads1256<SPI, CS, DRDY>, K, O) {
        (self.adc, self.sink, self.store)
    }

    /// Brings the converter up and loads the calibration offsets, entering
    /// calibration if none are stored.
    pub fn start(&mut self, delay: &mut impl DelayNs) -> Result<Identity, StepError<SPI, K>> {
        self.check_channels()?;
        let identity = self.adc.init(delay)?;
        self.load_calibration()?;
        Ok(identity)
    }

    /// Runs one cycle: a full scan, then either a calibration step or a
    /// fused estimate appended to the sink. Loads the calibration first if
    /// [`Meter::start`] was skipped.
    pub fn step(&mut self, delay: &mut impl DelayNs) -> Result<Cycle, StepError<SPI, K>> {
        self.check_channels()?;
        if matches!(self.stage, CalibrationStage::Off) {
            self.load_calibration()?;
        }

        let scan = self.adc.scan(delay)?;
        self.stats.cycles += 1;
        self.stats.stale_samples += scan.stale_count() as u64;

        let Some(masked) = scan.masked::<RANGE_COUNT>() else {
            return Err(MeterError::TooFewChannels {
                configured: scan.len() as u8,
            });
        };

        if let Some(offsets) = self.stage.offsets() {
            let estimate = fuse(masked, offsets);
            self.sink.append(estimate).map_err(Self::storage)?;
            self.stats.estimates += 1;
            return Ok(Cycle::Measured(estimate));
        }

        match self.stage.feed(masked) {
            Progress::Finished(offsets) => {
                let [a, b, c] = offsets.0;
                info!("calibration finished, offsets {} {} {}", a, b, c);
                self.store.save(&offsets).map_err(Self::storage)?;
                self.sink.open_bucket().map_err(Self::storage)?;
                Ok(Cycle::Calibrated(offsets))
            }
            Progress::Accumulating { scans } => {
                if scans % 4096 == 0 {
                    debug!("calibration {}/{}", scans, CALIBRATION_SCANS);
                }
                Ok(Cycle::Calibrating { scans })
            }
            // Only an `Off` stage ignores scans, and it was loaded above
            Progress::Ignored => Ok(Cycle::Calibrating { scans: 0 }),
        }
    }

    /// Cycles until a bus or storage failure; never returns otherwise.
    pub fn run(&mut self, delay: &mut impl DelayNs) -> Result<Infallible, StepError<SPI, K>> {
        loop {
            self.step(delay)?;
        }
    }

    fn load_calibration(&mut self) -> Result<(), StepError<SPI, K>> {
        match self.store.load().map_err(Self::storage)? {
            Some(offsets) => {
                let [a, b, c] = offsets.0;
                info!("calibration offsets loaded: {} {} {}", a, b, c);
                self.stage = CalibrationStage::Complete(offsets);
                self.sink.open_bucket().map_err(Self::storage)?;
            }
            None => {
                info!(
                    "no calibration record, calibrating over {} scans",
                    CALIBRATION_SCANS
                );
                self.stage = CalibrationStage::start();
            }
        }
        Ok(())
    }

    fn storage(err: K::Error) -> StepError<SPI, K> {
        MeterError::Storage(err)
    }

    fn check_channels(&self) -> Result<(), StepError<SPI, K>> {
        let configured = self.adc.config().channel_count();
        if usize::from(configured) < RANGE_COUNT {
            return Err(MeterError::TooFewChannels { configured });
        }
        Ok(())
    }
}
