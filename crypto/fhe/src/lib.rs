//! SecretBox Encryption Gateway
//!
//! Client side of the encrypted-input / user-decryption flow:
//!
//! - Encrypt a small integer into a 32-byte handle plus input proof, scoped to a
//!   contract and a user
//! - Decrypt a result handle back to plaintext under a signed, time-limited
//!   authorization
//!
//! # Architecture:
//! - [`EncryptionGateway`]: the capability the session drives
//! - [`RelayerGateway`]: adapter over the external relayer SDK ([`RelayerBackend`])
//! - [`MockGateway`]: drop-in replacement when the SDK is unavailable
//! - [`LazyGateway`]: owned handle that connects once and caches the instance

pub mod auth;
pub mod errors;
pub mod gateway;
pub mod input;
pub mod mock;
pub mod relayer;
pub mod sdk;

pub use auth::{
    authorize, unix_now, DecryptAuthorization, DecryptKeypair, DecryptRequest, LocalSigner,
    SigningIdentity, DEFAULT_DURATION_DAYS,
};
pub use errors::{FheError, FheResult};
pub use gateway::{EncryptionGateway, GatewayConnector, LazyGateway};
pub use input::EncryptedInput;
pub use mock::{MockConfig, MockGateway, MOCK_REWARDS};
pub use relayer::{RelayerBackend, RelayerConnector, RelayerGateway};
pub use sdk::{decode_decrypt_result, decode_encrypt_result, WireBytes, WireEncryptResult};
