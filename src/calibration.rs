//! One-time zero-current offset calibration.

use crate::fusion::RANGE_COUNT;

/// Scans averaged into each offset.
pub const CALIBRATION_SCANS: u32 = 16_384;

/// Per-channel zero offsets in raw converter codes, channel order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationOffsets(pub [i32; RANGE_COUNT]);

impl CalibrationOffsets {
    pub const ZERO: Self = Self([0; RANGE_COUNT]);
}

/// Running per-channel sums of noise-masked codes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Accumulator {
    sums: [i64; RANGE_COUNT],
    scans: u32,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scans(&self) -> u32 {
        self.scans
    }

    pub fn is_full(&self) -> bool {
        self.scans >= CALIBRATION_SCANS
    }

    /// Adds one scan. Returns the offsets once exactly
    /// [`CALIBRATION_SCANS`] scans have been added; scans beyond that are
    /// ignored.
    pub fn add(&mut self, masked: [i32; RANGE_COUNT]) -> Option<CalibrationOffsets> {
        if self.is_full() {
            return None;
        }

        for (sum, value) in self.sums.iter_mut().zip(masked) {
            *sum += i64::from(value);
        }
        self.scans += 1;

        self.is_full().then(|| self.offsets())
    }

    /// Truncated mean of everything added so far.
    fn offsets(&self) -> CalibrationOffsets {
        let count = i64::from(self.scans.max(1));
        // |mean| never exceeds the largest 24-bit code, so it fits an i32
        CalibrationOffsets(self.sums.map(|sum| (sum / count) as i32))
    }
}

/// Where the meter is in its calibration lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationStage {
    /// Offsets have been neither loaded nor started
    #[default]
    Off,
    Accumulating(Accumulator),
    Complete(CalibrationOffsets),
}

/// What feeding a scan into the stage did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    /// Still accumulating; `scans` of [`CALIBRATION_SCANS`] done
    Accumulating { scans: u32 },
    /// The scan completed the calibration
    Finished(CalibrationOffsets),
    /// The stage was not accumulating, the scan was not used
    Ignored,
}

impl CalibrationStage {
    pub fn start() -> Self {
        Self::Accumulating(Accumulator::new())
    }

    pub fn offsets(&self) -> Option<&CalibrationOffsets> {
        match self {
            Self::Complete(offsets) => Some(offsets),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    /// Feeds one noise-masked scan. Completing the accumulation moves the
    /// stage to `Complete`; a complete stage never changes again.
    pub fn feed(&mut self, masked: [i32; RANGE_COUNT]) -> Progress {
        let Self::Accumulating(accumulator) = self else {
            return Progress::Ignored;
        };

        match accumulator.add(masked) {
            Some(offsets) => {
                *self = Self::Complete(offsets);
                Progress::Finished(offsets)
            }
            None => Progress::Accumulating {
                scans: accumulator.scans(),
            },
        }
    }
}
