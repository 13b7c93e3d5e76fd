use crate::core::flags::LockFlags;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KdbError {
    #[error("Null argument: {0} was not supplied")]
    NullArgument(&'static str),

    #[error("Invalid key name: {0}")]
    InvalidName(String),

    #[error("Key '{name}' is locked ({facet:?})")]
    LockViolation { name: String, facet: LockFlags },

    #[error("Formatting the value failed")]
    FormatFailure,

    #[error("Validation of '{key}' rejected: {reason}")]
    ValidationRejected { key: String, reason: String },

    #[error("Buffer too small: {needed} slots needed, {available} available")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for KdbError {
    fn from(err: toml::de::Error) -> Self {
        KdbError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for KdbError {
    fn from(err: toml::ser::Error) -> Self {
        KdbError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KdbError>;
