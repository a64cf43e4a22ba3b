//! Decoding of relayer SDK results
//!
//! SDK builds disagree on the shape of an encryption result. Some return
//! `{ handles: [...], inputProof }`, older ones `{ encryptedData, proof }`, and
//! byte fields arrive as hex strings, plain arrays, or index-keyed objects
//! (a serialized `Uint8Array`). All of that is resolved here into
//! [`EncryptedInput`]; nothing past this module sees the raw shapes.

use crate::errors::{FheError, FheResult};
use crate::input::EncryptedInput;
use secretbox_primitives::{decode_hex, Handle};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// A byte string in any of the encodings the SDK emits
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireBytes {
    /// `"0x..."` or bare hex
    Hex(String),
    /// `[1, 2, 3]`
    Array(Vec<u8>),
    /// `{"0": 1, "1": 2}`
    Indexed(BTreeMap<String, u8>),
}

impl WireBytes {
    pub fn into_bytes(self) -> FheResult<Vec<u8>> {
        match self {
            WireBytes::Hex(s) => Ok(decode_hex(&s)?),
            WireBytes::Array(bytes) => Ok(bytes),
            WireBytes::Indexed(map) => {
                let mut indexed = map
                    .into_iter()
                    .map(|(k, v)| {
                        k.parse::<usize>()
                            .map(|i| (i, v))
                            .map_err(|_| FheError::MalformedResult(format!("non-numeric byte index {k}")))
                    })
                    .collect::<FheResult<Vec<_>>>()?;
                indexed.sort_by_key(|(i, _)| *i);
                if indexed.iter().enumerate().any(|(pos, (i, _))| pos != *i) {
                    return Err(FheError::MalformedResult("byte indices are not contiguous".into()));
                }
                Ok(indexed.into_iter().map(|(_, v)| v).collect())
            }
        }
    }
}

/// Encryption result as returned by the SDK
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireEncryptResult {
    /// Current SDK shape
    Handles {
        handles: Vec<WireBytes>,
        #[serde(rename = "inputProof")]
        input_proof: WireBytes,
    },
    /// Legacy single-field shape
    Single {
        #[serde(rename = "encryptedData")]
        encrypted_data: WireBytes,
        proof: WireBytes,
    },
}

impl WireEncryptResult {
    /// Parse a raw JSON result
    pub fn from_value(value: Value) -> FheResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| FheError::MalformedResult(format!("unexpected encrypt result: {e}")))
    }
}

impl TryFrom<WireEncryptResult> for EncryptedInput {
    type Error = FheError;

    fn try_from(wire: WireEncryptResult) -> FheResult<Self> {
        let (payload, proof) = match wire {
            WireEncryptResult::Handles { handles, input_proof } => {
                let first = handles
                    .into_iter()
                    .next()
                    .ok_or_else(|| FheError::MalformedResult("encrypt result has no handles".into()))?;
                (first.into_bytes()?, input_proof.into_bytes()?)
            }
            WireEncryptResult::Single { encrypted_data, proof } => {
                (encrypted_data.into_bytes()?, proof.into_bytes()?)
            }
        };
        EncryptedInput::from_raw(&payload, proof)
    }
}

/// Decode an SDK encryption result straight into the canonical input
pub fn decode_encrypt_result(value: Value) -> FheResult<EncryptedInput> {
    WireEncryptResult::from_value(value)?.try_into()
}

/// Decode a user-decrypt result: a map from handle to plaintext.
///
/// Looks the handle up by hex (case-insensitive), falling back to the only or
/// first entry when the relayer keys results differently.
pub fn decode_decrypt_result(value: Value, handle: &Handle) -> FheResult<u64> {
    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(FheError::MalformedResult(format!(
                "decrypt result is not an object: {other}"
            )))
        }
    };

    let wanted = handle.to_hex();
    let entry = map
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(&wanted) || k.eq_ignore_ascii_case(&wanted[2..]))
        .or_else(|| map.iter().next())
        .map(|(_, v)| v)
        .ok_or_else(|| FheError::UnknownHandle(wanted.clone()))?;

    plaintext_to_u64(entry)
}

fn plaintext_to_u64(value: &Value) -> FheResult<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| FheError::MalformedResult(format!("plaintext {n} is not a non-negative integer"))),
        Value::String(s) => {
            let s = s.trim();
            let parsed = match s.strip_prefix("0x") {
                Some(digits) => u64::from_str_radix(digits, 16),
                None => s.parse::<u64>(),
            };
            parsed.map_err(|_| FheError::MalformedResult(format!("plaintext {s:?} is not a non-negative integer")))
        }
        other => Err(FheError::MalformedResult(format!("unexpected plaintext {other}"))),
    }
}
