//! Encryption gateway error types

use secretbox_primitives::PrimitiveError;
use thiserror::Error;

/// Errors that can occur while encrypting inputs or decrypting results
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FheError {
    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Handle or proof had the wrong shape
    #[error("Invalid handle: {0}")]
    InvalidHandle(#[from] PrimitiveError),

    /// The SDK returned an output shape we do not understand
    #[error("Malformed gateway result: {0}")]
    MalformedResult(String),

    /// Decrypt authorization is outside its validity window
    #[error("Decrypt authorization expired: valid from {start} for {duration_secs}s, now {now}")]
    AuthorizationExpired {
        start: u64,
        duration_secs: u64,
        now: u64,
    },

    /// Decrypt authorization does not cover the requested contract
    #[error("Decrypt authorization does not cover contract {0}")]
    ContractNotAuthorized(String),

    /// Signature missing or rejected
    #[error("Signature rejected: {0}")]
    SignatureRejected(String),

    /// The gateway has no plaintext for this handle
    #[error("Unknown handle: {0}")]
    UnknownHandle(String),

    /// No gateway backend could be connected
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for gateway operations
pub type FheResult<T> = Result<T, FheError>;
