use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

/// Why a transfer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The slave did not acknowledge outside the address phase, or kept refusing its
    /// address past the retry limit.
    Nack,
    /// Misplaced START or STOP detected.
    Bus,
    ArbitrationLoss,
    Overrun,
    /// No completion within the transfer timeout, or the bus stayed busy after it.
    Timeout,
    /// The bus was busy before the transfer and a reset did not free it.
    Busy,
    /// The bus has no users, so it is powered down.
    Disabled,
    /// Zero bytes, or more than the bus transfer buffer holds.
    InvalidLength,
    /// The operation sequence does not map onto a register read or write.
    Unsupported,
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            Self::Bus => ErrorKind::Bus,
            Self::ArbitrationLoss => ErrorKind::ArbitrationLoss,
            Self::Overrun => ErrorKind::Overrun,
            Self::Timeout
            | Self::Busy
            | Self::Disabled
            | Self::InvalidLength
            | Self::Unsupported => ErrorKind::Other,
        }
    }
}
