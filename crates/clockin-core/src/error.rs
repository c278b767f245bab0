use thiserror::Error;

/// Why a raw scan was refused by the normalizer.
///
/// Rejected scans are dropped: they are never retried, never sent to the
/// authority and never written to the offline queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("Empty card number")]
    Empty,

    #[error("Card number too short: {length} chars, minimum is {minimum}")]
    TooShort { length: usize, minimum: usize },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid card: {0}")]
    InvalidCard(#[from] RejectionReason),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
