//! Canonical encrypted input
//!
//! Whatever shape the underlying SDK hands back, the rest of the workspace only
//! ever sees one fixed-width handle plus an opaque proof.

use crate::errors::FheResult;
use secretbox_primitives::{encode_hex, Handle};
use serde::{Deserialize, Serialize};

/// Encrypted value ready to be passed to a contract call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    /// Ciphertext handle (`externalEuint8` on the contract side)
    pub payload: Handle,
    /// Input proof binding the handle to contract and user
    pub proof: Vec<u8>,
}

impl EncryptedInput {
    /// Create from an already fixed-width handle
    pub fn new(payload: Handle, proof: Vec<u8>) -> Self {
        Self { payload, proof }
    }

    /// Create from raw SDK bytes.
    ///
    /// Payloads shorter than 32 bytes are zero-padded; longer payloads are an
    /// error.
    pub fn from_raw(payload: &[u8], proof: Vec<u8>) -> FheResult<Self> {
        if payload.len() != Handle::LEN {
            tracing::warn!(
                len = payload.len(),
                expected = Handle::LEN,
                "encrypted handle has unexpected width"
            );
        }
        let payload = Handle::from_padded(payload)?;
        Ok(Self { payload, proof })
    }

    /// Hex form of the proof
    pub fn proof_hex(&self) -> String {
        encode_hex(&self.proof)
    }
}
