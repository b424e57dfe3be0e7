use embedded_hal::digital;

/// Bus or addressing failure. Timeouts and identity mismatches are not
/// errors; see [`crate::Readiness`] and [`crate::Identity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    #[error("SPI transfer failed: {0:?}")]
    Spi(E),
    /// Chip select or DRDY could not be driven or sensed
    #[error("pin access failed: {0:?}")]
    Pin(digital::ErrorKind),
    /// The scan mode has no multiplexer setting for this channel
    #[error("channel {0} is not addressable in this scan mode")]
    Channel(u8),
}

impl<E> Error<E> {
    pub(crate) fn pin(err: impl digital::Error) -> Self {
        Self::Pin(err.kind())
    }
}
