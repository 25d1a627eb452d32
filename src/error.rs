use std::io;

/// Errors surfaced by the runtime's public API.
///
/// Every fallible entry point in this crate returns one of these kinds; there
/// is no catch-all "internal error" variant because every failure here is
/// either a caller mistake ([`Error::InvalidArgument`]), an expected
/// transient condition ([`Error::Busy`], [`Error::Timeout`]), or an OS-level
/// failure we can't recover from ([`Error::Access`], [`Error::Create`]).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A non-power-of-two capacity, a null/missing callback, or an unknown
    /// enum variant was passed at construction time.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation cannot complete yet (e.g. ADC calibration has not
    /// reached its sample budget). Not fatal; the caller should retry.
    #[error("busy: {0}")]
    Busy(String),

    /// An OS mapping or file failed to open or map.
    #[error("access denied: {0}")]
    Access(#[source] io::Error),

    /// A receive-with-deadline expired.
    #[error("operation timed out")]
    Timeout,

    /// OS mapping creation failed.
    #[error("failed to create mapping: {0}")]
    Create(#[source] io::Error),
}

/// Convenience alias used throughout the crate's public API.
pub type Result<T> = std::result::Result<T, Error>;
