//! Error types for contract calls

use thiserror::Error;

/// Errors that can occur while reading from or submitting to the chain
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    #[error("ABI encoding error: {0}")]
    ABIEncodingError(String),

    #[error("ABI decoding error: {0}")]
    ABIDecodingError(String),

    #[error("Parameter count mismatch: expected {expected}, got {got}")]
    ParameterCountMismatch { expected: usize, got: usize },

    #[error("Invalid parameter type at index {index}: {message}")]
    InvalidParameterType { index: usize, message: String },

    #[error("Call failed: {0}")]
    CallFailed(String),

    #[error("Transaction submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Transaction {0} reverted")]
    Reverted(String),

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("Confirmation of {tx} timed out after {secs}s")]
    ConfirmationTimeout { tx: String, secs: u64 },

    #[error("RPC error: {0}")]
    Rpc(String),
}

/// Result type for chain operations
pub type ChainResult<T> = Result<T, ChainError>;
