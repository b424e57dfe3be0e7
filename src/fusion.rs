//! Three-range current fusion.
//!
//! Each shunt tap is wired to its own converter channel. After offset
//! removal and scaling every tap yields a voltage proxy; the taps are ten
//! times apart in sensitivity, so a healthy scan always satisfies
//! `fine >= medium >= coarse`. Everything here is integer arithmetic, widened
//! to `i64` so that no intermediate can overflow at full-scale input.

use crate::calibration::CalibrationOffsets;

/// Shunt taps fused per cycle.
pub const RANGE_COUNT: usize = 3;

/// Converter channel of each tap.
pub const COARSE_CHANNEL: usize = 0;
pub const MEDIUM_CHANNEL: usize = 1;
pub const FINE_CHANNEL: usize = 2;

/// Code-to-proxy scale, `code * 100 / 167 / 4`. 167 is twice the ratio of
/// the largest positive code (8 388 607) to 100 000; together with the
/// divide by four it folds the PGA full scale (1.25 V at ×4) and the ×200
/// shunt amplifier into one fixed-point step.
pub const SCALE_NUMERATOR: i64 = 100;
pub const SCALE_FULL_SCALE_DIVISOR: i64 = 167;
pub const SCALE_AMPLIFIER_DIVISOR: i64 = 4;

/// Fine-tap proxy above which the fine channel is saturated (about 4.5/5 of
/// full scale through the amplifier chain).
pub const FINE_SATURATION: i64 = 7_500_000;

/// Ratio between adjacent taps.
pub const TAP_RATIO: i64 = 10;

/// Proxy-to-microampere factors, one per shunt (100:10:1).
pub const COARSE_MICROAMPS_PER_UNIT: i64 = 500;
pub const MEDIUM_MICROAMPS_PER_UNIT: i64 = 50;
pub const FINE_MICROAMPS_PER_UNIT: i64 = 5;

/// Below this the fine tap is the only one with usable resolution (100 uA).
pub const LOW_CURRENT_THRESHOLD: i64 = 100_000;
/// Above this the finer taps are saturated (10 mA).
pub const HIGH_CURRENT_THRESHOLD: i64 = 10_000_000;

/// Microamperes; divide by 10^6 for amperes.
pub type CurrentEstimate = i32;

/// One value per shunt tap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Taps<T> {
    pub coarse: T,
    pub medium: T,
    pub fine: T,
}

impl<T: Copy> Taps<T> {
    pub fn from_channels(channels: [T; RANGE_COUNT]) -> Self {
        Self {
            coarse: channels[COARSE_CHANNEL],
            medium: channels[MEDIUM_CHANNEL],
            fine: channels[FINE_CHANNEL],
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Taps<U> {
        Taps {
            coarse: f(self.coarse),
            medium: f(self.medium),
            fine: f(self.fine),
        }
    }

    fn map_with<U: Copy, V>(self, other: &Taps<U>, mut f: impl FnMut(T, U) -> V) -> Taps<V> {
        Taps {
            coarse: f(self.coarse, other.coarse),
            medium: f(self.medium, other.medium),
            fine: f(self.fine, other.fine),
        }
    }
}

/// Removes the offset, clamps negatives to zero and scales to the proxy.
pub fn scale(masked: i32, offset: i32) -> i64 {
    let above_zero = (i64::from(masked) - i64::from(offset)).max(0);
    above_zero * SCALE_NUMERATOR / SCALE_FULL_SCALE_DIVISOR / SCALE_AMPLIFIER_DIVISOR
}

/// Replaces readings that break `fine >= medium >= coarse` with a scaled
/// copy of the more reliable neighbour. The three rules run once, in this
/// order, each seeing the result of the previous one.
pub fn correct_glitches(mut proxy: Taps<i64>) -> Taps<i64> {
    if proxy.coarse >= proxy.medium {
        proxy.coarse = proxy.medium / TAP_RATIO;
    }
    if proxy.medium >= proxy.fine && proxy.fine < FINE_SATURATION {
        proxy.medium = proxy.fine / TAP_RATIO;
    }
    if proxy.fine < proxy.medium || proxy.fine > FINE_SATURATION {
        proxy.fine = proxy.medium * TAP_RATIO;
    }
    proxy
}

/// Converts each proxy with its shunt's factor.
pub fn to_microamps(proxy: Taps<i64>) -> Taps<i64> {
    Taps {
        coarse: proxy.coarse * COARSE_MICROAMPS_PER_UNIT,
        medium: proxy.medium * MEDIUM_MICROAMPS_PER_UNIT,
        fine: proxy.fine * FINE_MICROAMPS_PER_UNIT,
    }
}

/// Picks the cycle's current. Very low currents trust the fine tap, very
/// high currents the coarse tap; in between the two taps that agree best
/// are averaged and the third discarded.
pub fn select(current: Taps<i64>) -> i64 {
    if current.fine < LOW_CURRENT_THRESHOLD {
        return current.fine;
    }
    if current.coarse > HIGH_CURRENT_THRESHOLD {
        return current.coarse;
    }

    let fine_medium = (current.fine - current.medium).abs();
    let fine_coarse = (current.fine - current.coarse).abs();
    let medium_coarse = (current.medium - current.coarse).abs();

    // Ties prefer fine/medium, then fine/coarse
    if fine_medium <= fine_coarse && fine_medium <= medium_coarse {
        (current.fine + current.medium) / 2
    } else if fine_coarse <= medium_coarse {
        (current.fine + current.coarse) / 2
    } else {
        (current.medium + current.coarse) / 2
    }
}

/// Full pipeline for one cycle: noise-masked codes in channel order and the
/// calibration offsets in, one current estimate out. Pure.
pub fn fuse(masked: [i32; RANGE_COUNT], offsets: &CalibrationOffsets) -> CurrentEstimate {
    let proxy = Taps::from_channels(masked).map_with(&Taps::from_channels(offsets.0), scale);
    let current = select(to_microamps(correct_glitches(proxy)));

    saturate(current)
}

fn saturate(value: i64) -> CurrentEstimate {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
