//! Error types for the sitting tracker daemon.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Reading from or writing to the persistent store failed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The activity probe could not answer.
    #[error("activity probe unavailable: {0}")]
    ProbeUnavailable(String),

    /// A notification could not be dispatched.
    #[error("notifier unavailable: {0}")]
    NotifierUnavailable(String),

    /// A settings update carried an unusable value.
    #[error("invalid setting {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    /// An inbound frame could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
