//! Primitive parsing errors

use thiserror::Error;

/// Errors raised while parsing fixed-width identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Invalid length for {kind}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Result type for primitive parsing
pub type PrimitiveResult<T> = Result<T, PrimitiveError>;
