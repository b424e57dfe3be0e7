//! Conversion results and their decoding.

/// Low bits cleared from every conversion before it is used; they carry
/// nothing but converter noise at the configured rate.
pub const NOISE_BITS: u32 = 4;

const NOISE_MASK: i32 = !((1 << NOISE_BITS) - 1);

/// Most channels one scan can hold (single-ended AIN0-AIN7).
pub const MAX_CHANNELS: usize = 8;

/// Assembles a big-endian 24-bit conversion and sign-extends it.
pub fn decode_conversion(bytes: [u8; 3]) -> i32 {
    let value = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);

    // Bit 23 is the sign bit of the 24-bit two's complement result
    if value & 0x80_0000 != 0 {
        (value | 0xFF00_0000) as i32
    } else {
        value as i32
    }
}

/// Clears the noise bits. Rounds towards negative infinity for negative
/// codes, same as masking the two's complement value.
pub fn mask_noise(raw: i32) -> i32 {
    raw & NOISE_MASK
}

/// One conversion read from one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelSample {
    pub channel: u8,
    /// Signed code in [-2^23, 2^23 - 1]
    pub raw: i32,
    /// DRDY never asserted before the read, so this may repeat the previous
    /// conversion
    pub stale: bool,
}

/// The samples of one pass over every configured channel, indexed by channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Scan {
    raw: [i32; MAX_CHANNELS],
    len: u8,
    stale: u8,
}

impl Scan {
    pub(crate) const fn empty() -> Self {
        Self {
            raw: [0; MAX_CHANNELS],
            len: 0,
            stale: 0,
        }
    }

    /// Stores `sample` in its channel slot.
    pub(crate) fn insert(&mut self, sample: ChannelSample) {
        let index = usize::from(sample.channel);
        if index < MAX_CHANNELS {
            self.raw[index] = sample.raw;
            self.len = self.len.max(sample.channel + 1);
            if sample.stale {
                self.stale += 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of samples read without DRDY having asserted.
    pub fn stale_count(&self) -> usize {
        usize::from(self.stale)
    }

    pub fn raw(&self) -> &[i32] {
        &self.raw[..self.len()]
    }

    /// The first `N` channels with the noise bits cleared, or `None` if the
    /// scan holds fewer than `N` channels.
    pub fn masked<const N: usize>(&self) -> Option<[i32; N]> {
        if self.len() < N {
            return None;
        }
        let mut out = [0; N];
        for (dst, src) in out.iter_mut().zip(self.raw.iter()) {
            *dst = mask_noise(*src);
        }
        Some(out)
    }
}

impl FromIterator<i32> for Scan {
    fn from_iter<T: IntoIterator<Item = i32>>(iter: T) -> Self {
        let mut scan = Scan::empty();
        for (channel, raw) in iter.into_iter().take(MAX_CHANNELS).enumerate() {
            scan.insert(ChannelSample {
                channel: channel as u8,
                raw,
                stale: false,
            });
        }
        scan
    }
}
