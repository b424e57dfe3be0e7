//! Three-range shunt current meter built on the TI ADS1256 24-bit ADC.
//!
//! A load current flows through three shunts whose amplified voltages sit
//! on converter channels 0 (coarse), 1 (medium) and 2 (fine). Every cycle
//! the meter scans the three channels, removes the stored zero-current
//! offsets, fuses the three readings into one microampere estimate and
//! appends it to a time-bucketed log.
//!
//! The converter side only needs `embedded-hal` 1.0 traits: an [`SpiBus`]
//! for the serial interface, an [`OutputPin`] for chip select and an
//! [`InputPin`] for DRDY. Blocking waits take a [`DelayNs`].
//!
//! ```ignore
//! let adc = Ads1256::new(spi, cs, drdy, DeviceConfig::default());
//! let config = LogConfig::default();
//! let mut meter = Meter::new(adc, config.sample_log(), config.calibration_file());
//!
//! meter.start(&mut delay)?;
//! meter.run(&mut delay)?;
//! ```
//!
//! [`SpiBus`]: embedded_hal::spi::SpiBus
//! [`OutputPin`]: embedded_hal::digital::OutputPin
//! [`InputPin`]: embedded_hal::digital::InputPin
//! [`DelayNs`]: embedded_hal::delay::DelayNs

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod fmt;

mod calibration;
mod config;
mod driver;
mod error;
mod fusion;
mod meter;
mod poll;
pub mod registers;
mod sample;
#[cfg(feature = "std")]
pub mod store;

pub use calibration::{
    Accumulator, CalibrationOffsets, CalibrationStage, Progress, CALIBRATION_SCANS,
};
pub use config::{DeviceConfig, Timing};
pub use driver::{AcquisitionState, Ads1256, Identity};
pub use error::Error;
pub use fusion::{
    correct_glitches, fuse, scale, select, to_microamps, CurrentEstimate, Taps, COARSE_CHANNEL,
    FINE_CHANNEL, MEDIUM_CHANNEL, RANGE_COUNT,
};
pub use meter::{Cycle, Meter, MeterError, OffsetStore, SampleSink, Stats};
pub use poll::{Readiness, ReadyPoll};
pub use registers::{Calibration, Command, DataRate, Gain, Register, ScanMode};
pub use sample::{decode_conversion, mask_noise, ChannelSample, Scan, MAX_CHANNELS, NOISE_BITS};
#[cfg(feature = "std")]
pub use store::{BucketedLog, CalibrationFile, Clock, LogConfig, StoreError, SystemClock};
