//! Error types for relayvote-core.

use thiserror::Error;

use crate::{Address, Hash, Timestamp};

pub type Result<T> = std::result::Result<T, Error>;

/// Core errors.
///
/// Every variant up to `IndexOutOfRange` is a rejection: the call that
/// produced it left no trace in the store.
#[derive(Debug, Error)]
pub enum Error {
    /// Process id not known to the registry.
    #[error("process not found: {0}")]
    NotFound(Hash),

    /// Caller identity is not allowed to perform the operation.
    #[error("unauthorized caller: {0}")]
    Unauthorized(Address),

    /// Process start is not strictly before its end.
    #[error("invalid time window: start {start} is not before end {end}")]
    InvalidWindow { start: Timestamp, end: Timestamp },

    /// Relay address already registered for the process.
    #[error("relay {relay} already registered for process {process}")]
    DuplicateRelay { process: Hash, relay: Address },

    /// Relay address never registered for the process.
    #[error("relay {relay} not registered for process {process}")]
    RelayNotFound { process: Hash, relay: Address },

    /// Process is canceled or outside its voting window.
    #[error("process {0} is not active")]
    ProcessNotActive(Hash),

    /// Key reveal attempted before the process ended.
    #[error("process {process} ends at {end}, now is {now}")]
    TooEarly {
        process: Hash,
        end: Timestamp,
        now: Timestamp,
    },

    /// The private key has already been published.
    #[error("private key already revealed for process {0}")]
    AlreadyRevealed(Hash),

    /// The process has already been canceled.
    #[error("process {0} already canceled")]
    AlreadyCanceled(Hash),

    /// Index does not address an existing element.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Signed call failed verification.
    #[error("invalid signature for sender: {0}")]
    InvalidSignature(Address),

    /// Signed call out of sequence for its sender.
    #[error("nonce {got} out of sequence, expected {expected}")]
    InvalidNonce { expected: u64, got: u64 },

    /// The caller's clock reading went backwards.
    #[error("clock regression: last committed at {last}, call at {now}")]
    ClockRegression { last: Timestamp, now: Timestamp },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Snapshot I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] confique::Error),
}

impl Error {
    /// True for domain rejections, false for infrastructure failures.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::Unauthorized(_)
                | Error::InvalidWindow { .. }
                | Error::DuplicateRelay { .. }
                | Error::RelayNotFound { .. }
                | Error::ProcessNotActive(_)
                | Error::TooEarly { .. }
                | Error::AlreadyRevealed(_)
                | Error::AlreadyCanceled(_)
                | Error::IndexOutOfRange { .. }
        )
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<ciborium::de::Error<std::io::Error>> for Error {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        Error::Serialization(e.to_string())
    }
}
