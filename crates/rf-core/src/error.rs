//! Error types shared by the ReelForge scatter crates

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RfError {
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Invalid time range: start {start} must be before end {end}")]
    InvalidRange { start: f64, end: f64 },

    #[error("Invalid tempo: {0} BPM")]
    InvalidTempo(f64),

    #[error("State error: {0}")]
    State(String),
}

/// Result type alias
pub type RfResult<T> = Result<T, RfError>;
