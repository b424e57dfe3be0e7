//! Device and timing configuration, fixed at bring-up.

use crate::poll::ReadyPoll;
use crate::registers::{DataRate, Gain, ScanMode, STATUS_ACAL, STATUS_BUFEN};

/// Converter configuration. Written once by [`crate::Ads1256::init`] and
/// never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceConfig {
    pub gain: Gain,
    pub data_rate: DataRate,
    pub scan_mode: ScanMode,
    /// Channels scanned in single-ended mode, starting from AIN0. Differential
    /// mode always scans its four pairs.
    pub active_channels: u8,
    /// Self-calibrate whenever PGA, data rate or buffer settings change
    pub auto_calibrate: bool,
    pub input_buffer: bool,
}

impl Default for DeviceConfig {
    /// Gain ×4 gives a 1.25 V full scale; 3750 SPS over three channels
    /// leaves roughly 1250 scans per second.
    fn default() -> Self {
        Self {
            gain: Gain::X4,
            data_rate: DataRate::Sps3750,
            scan_mode: ScanMode::SingleEnded,
            active_channels: 3,
            auto_calibrate: true,
            input_buffer: true,
        }
    }
}

impl DeviceConfig {
    /// Number of channels one scan visits.
    pub fn channel_count(&self) -> u8 {
        match self.scan_mode {
            ScanMode::SingleEnded => self.active_channels.clamp(1, 8),
            ScanMode::Differential => ScanMode::Differential.max_channels(),
        }
    }

    pub fn status_byte(&self) -> u8 {
        let mut status = 0;
        if self.auto_calibrate {
            status |= STATUS_ACAL;
        }
        if self.input_buffer {
            status |= STATUS_BUFEN;
        }
        status
    }

    /// STATUS, MUX, ADCON and DRATE, written as one block starting at STATUS.
    ///
    /// MUX starts on AIN0 against AINCOM. ADCON keeps the clock output and
    /// sensor-detect current sources off.
    pub fn register_block(&self) -> [u8; 4] {
        [
            self.status_byte(),
            0x08,
            self.gain.bits(),
            self.data_rate.code(),
        ]
    }
}

/// Fixed delays around bus transactions, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Gap before every byte sent
    pub byte_gap_us: u32,
    /// DIN-to-DOUT turnaround for RDATA, RDATAC and RREG (t6 = 50 tCLKIN, 6.5 us)
    pub turnaround_us: u32,
    pub mux_settle_us: u32,
    pub sync_settle_us: u32,
    /// Conversion output is not valid before this has elapsed after WAKEUP
    pub wake_settle_us: u32,
    pub config_settle_us: u32,
    /// Spacing between consecutive channel reads in a scan
    pub channel_spacing_us: u32,
    pub ready: ReadyPoll,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            byte_gap_us: 2,
            turnaround_us: 7,
            mux_settle_us: 5,
            sync_settle_us: 5,
            wake_settle_us: 25,
            config_settle_us: 50,
            channel_spacing_us: 200,
            ready: ReadyPoll::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_register_block() {
        assert_eq!(
            DeviceConfig::default().register_block(),
            [0b0000_0110, 0x08, 0x02, 0xC0]
        );
    }

    #[test]
    fn status_flags_off() {
        let config = DeviceConfig {
            auto_calibrate: false,
            input_buffer: false,
            ..DeviceConfig::default()
        };
        assert_eq!(config.status_byte(), 0);
    }

    #[test]
    fn channel_count_follows_scan_mode() {
        let mut config = DeviceConfig::default();
        assert_eq!(config.channel_count(), 3);

        config.active_channels = 12;
        assert_eq!(config.channel_count(), 8);

        config.scan_mode = ScanMode::Differential;
        assert_eq!(config.channel_count(), 4);
    }
}
