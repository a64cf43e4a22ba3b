//! SecretBox Primitives
//!
//! Fixed-width identifiers shared by the gateway, contract and session crates:
//!
//! - [`Address`]: 20-byte account or contract address. Parsing is
//!   case-insensitive and the canonical text form is lower-case `0x` hex, so
//!   two spellings of the same wallet address always compare equal.
//! - [`Handle`]: 32-byte reference to an encrypted value (an encrypted input
//!   or an on-chain result).
//! - [`TxHash`]: 32-byte transaction identifier.

mod errors;

pub use errors::{PrimitiveError, PrimitiveResult};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Width of an encrypted handle in bytes
pub const HANDLE_SIZE: usize = 32;

/// Width of an address in bytes
pub const ADDRESS_SIZE: usize = 20;

/// Strip an optional `0x`/`0X` prefix and decode hex
pub fn decode_hex(input: &str) -> PrimitiveResult<Vec<u8>> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits).map_err(|e| PrimitiveError::InvalidHex(e.to_string()))
}

/// Encode bytes as lower-case `0x` hex
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $size:expr, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; $size]);

        impl $name {
            /// Byte width of this identifier
            pub const LEN: usize = $size;

            /// Wrap raw bytes
            pub const fn new(bytes: [u8; $size]) -> Self {
                Self(bytes)
            }

            /// Parse from a slice of exactly the right width
            pub fn from_slice(bytes: &[u8]) -> PrimitiveResult<Self> {
                let arr: [u8; $size] = bytes.try_into().map_err(|_| PrimitiveError::InvalidLength {
                    kind: $kind,
                    expected: $size,
                    actual: bytes.len(),
                })?;
                Ok(Self(arr))
            }

            /// Borrow the raw bytes
            pub fn as_bytes(&self) -> &[u8; $size] {
                &self.0
            }

            /// Lower-case `0x` hex form
            pub fn to_hex(&self) -> String {
                encode_hex(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = PrimitiveError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_slice(&decode_hex(s)?)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl From<[u8; $size]> for $name {
            fn from(bytes: [u8; $size]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// Account or contract address
    Address, ADDRESS_SIZE, "address"
);

fixed_bytes!(
    /// Opaque reference to an encrypted value
    Handle, HANDLE_SIZE, "handle"
);

fixed_bytes!(
    /// Transaction identifier
    TxHash, 32, "transaction hash"
);

impl Handle {
    /// Build a handle from a payload that may be shorter than the fixed width.
    ///
    /// Short payloads are zero-padded on the right. Longer payloads are
    /// rejected: truncating would silently change which ciphertext the
    /// contract resolves.
    pub fn from_padded(bytes: &[u8]) -> PrimitiveResult<Self> {
        if bytes.len() > HANDLE_SIZE {
            return Err(PrimitiveError::InvalidLength {
                kind: "handle",
                expected: HANDLE_SIZE,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; HANDLE_SIZE];
        out[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(out))
    }
}

impl Address {
    /// Canonical storage/scope key for this identity
    pub fn key(&self) -> String {
        self.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_is_case_insensitive() {
        let upper: Address = "0xCCC5F7093D37B8CF6C2F2522E67CD59A02AD90BE".parse().unwrap();
        let mixed: Address = "0xccc5f7093d37b8cF6C2F2522E67cd59a02AD90bE".parse().unwrap();
        let bare: Address = "ccc5f7093d37b8cf6c2f2522e67cd59a02ad90be".parse().unwrap();

        assert_eq!(upper, mixed);
        assert_eq!(mixed, bare);
        assert_eq!(upper.key(), "0xccc5f7093d37b8cf6c2f2522e67cd59a02ad90be");
    }

    #[test]
    fn test_address_wrong_length() {
        let err = "0x1234".parse::<Address>().unwrap_err();
        assert_eq!(
            err,
            PrimitiveError::InvalidLength { kind: "address", expected: 20, actual: 2 }
        );
        assert!(matches!("0xzz".parse::<Address>(), Err(PrimitiveError::InvalidHex(_))));
    }

    #[test]
    fn test_handle_padding() {
        let short = Handle::from_padded(&[0xab, 0xcd]).unwrap();
        assert_eq!(short.0[0], 0xab);
        assert_eq!(short.0[1], 0xcd);
        assert!(short.0[2..].iter().all(|b| *b == 0));

        let exact = Handle::from_padded(&[7u8; 32]).unwrap();
        assert_eq!(exact, Handle([7u8; 32]));

        assert!(Handle::from_padded(&[1u8; 33]).is_err());
    }

    #[test]
    fn test_serde_as_hex() {
        let hash = TxHash([0x11; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "11".repeat(32)));

        let restored: TxHash = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, hash);
    }
}
