use thiserror::Error;

/// Validation and contract errors exposed by `indexgate-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid RFC3339 timestamp: '{value}'")]
    InvalidTimestamp { value: String },
    #[error("invalid UTC offset '{value}', expected +HH:MM or -HH:MM")]
    InvalidOffset { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("index code cannot be empty")]
    EmptyIndexCode,
    #[error("index code '{code}' must be lowercase ASCII alphanumeric")]
    InvalidIndexCode { code: String },
    #[error("index code '{code}' is registered more than once")]
    DuplicateIndexCode { code: String },
}

/// Configuration errors raised while reading `INDEXGATE_*` variables.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {name} has invalid value '{value}': {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}
