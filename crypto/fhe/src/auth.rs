//! User decryption authorization
//!
//! Decrypting a result handle requires a signed request from the user that is
//! bound to:
//!
//! - an ephemeral re-encryption public key (x25519, fresh per request)
//! - the list of contracts whose handles may be decrypted
//! - a validity window (`start_timestamp` + `duration_days`)
//!
//! The gateway refuses requests that are unsigned, expired, or that do not
//! name the contract holding the handle.

use crate::errors::{FheError, FheResult};
use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use secretbox_primitives::Address;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use x25519_dalek::{PublicKey, StaticSecret};

/// Default validity of a decrypt authorization
pub const DEFAULT_DURATION_DAYS: u64 = 10;

const SECONDS_PER_DAY: u64 = 86_400;

/// Domain tag mixed into every request digest
const REQUEST_DOMAIN: &[u8] = b"UserDecryptRequestVerification";

/// Ephemeral keypair the gateway re-encrypts the plaintext to
pub struct DecryptKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl DecryptKeypair {
    /// Generate a fresh keypair
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Public half, sent with the request
    pub fn public_key(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Private half, only handed to the local SDK
    pub fn private_key(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }
}

/// The typed request a user signs to authorize decryption
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptRequest {
    /// Re-encryption public key
    pub public_key: [u8; 32],
    /// Contracts covered by this authorization
    pub contract_addresses: Vec<Address>,
    /// Requesting user
    pub user: Address,
    /// Window start (unix seconds)
    pub start_timestamp: u64,
    /// Window length in days
    pub duration_days: u64,
}

impl DecryptRequest {
    /// Build a request starting at `now` with the default window
    pub fn new(public_key: [u8; 32], contract: Address, user: Address, now: u64) -> Self {
        Self {
            public_key,
            contract_addresses: vec![contract],
            user,
            start_timestamp: now,
            duration_days: DEFAULT_DURATION_DAYS,
        }
    }

    /// Window length in seconds
    pub fn duration_secs(&self) -> u64 {
        self.duration_days.saturating_mul(SECONDS_PER_DAY)
    }

    /// First second at which the request is no longer valid
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp.saturating_add(self.duration_secs())
    }

    /// Whether `now` falls inside the validity window
    pub fn is_valid_at(&self, now: u64) -> bool {
        now >= self.start_timestamp && now < self.expires_at()
    }

    /// Whether handles of `contract` may be decrypted with this request
    pub fn covers(&self, contract: &Address) -> bool {
        self.contract_addresses.iter().any(|c| c == contract)
    }

    /// Digest that gets signed
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Keccak256::new();
        hasher.update(REQUEST_DOMAIN);
        hasher.update(self.public_key);
        for contract in &self.contract_addresses {
            hasher.update(contract.as_bytes());
        }
        hasher.update(self.user.as_bytes());
        hasher.update(self.start_timestamp.to_be_bytes());
        hasher.update(self.duration_days.to_be_bytes());
        hasher.finalize().into()
    }
}

/// A signed decrypt request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptAuthorization {
    pub request: DecryptRequest,
    pub signature: Vec<u8>,
}

impl DecryptAuthorization {
    /// Check window, contract binding and presence of a signature.
    ///
    /// Cryptographic verification of the signature is the relayer's job; the
    /// local signer exposes [`LocalSigner::verify`] for the in-process gateway.
    pub fn check(&self, contract: &Address, now: u64) -> FheResult<()> {
        if self.signature.is_empty() {
            return Err(FheError::SignatureRejected("missing signature".into()));
        }
        if !self.request.covers(contract) {
            return Err(FheError::ContractNotAuthorized(contract.to_hex()));
        }
        if !self.request.is_valid_at(now) {
            return Err(FheError::AuthorizationExpired {
                start: self.request.start_timestamp,
                duration_secs: self.request.duration_secs(),
                now,
            });
        }
        Ok(())
    }

    /// Signature as hex without `0x`, the form relayers expect
    pub fn signature_hex(&self) -> String {
        hex::encode(&self.signature)
    }
}

/// The user's signing identity
#[async_trait]
pub trait SigningIdentity: Send + Sync {
    /// Address of the signing account
    fn address(&self) -> Address;

    /// Sign a decrypt request
    async fn sign_decrypt_request(&self, request: &DecryptRequest) -> FheResult<Vec<u8>>;
}

/// Build and sign a decrypt authorization for `contract`
pub async fn authorize(
    signer: &dyn SigningIdentity,
    contract: Address,
    now: u64,
) -> FheResult<(DecryptKeypair, DecryptAuthorization)> {
    let keypair = DecryptKeypair::generate();
    let request = DecryptRequest::new(keypair.public_key(), contract, signer.address(), now);
    let signature = signer.sign_decrypt_request(&request).await?;

    Ok((keypair, DecryptAuthorization { request, signature }))
}

/// In-process signer backed by an ed25519 key
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl LocalSigner {
    /// Deterministic signer from a 32-byte seed
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let key = SigningKey::from_bytes(&seed);
        let address = derive_address(&key.verifying_key());
        Self { key, address }
    }

    /// Fresh random signer
    pub fn generate() -> Self {
        let key = SigningKey::generate(&mut OsRng);
        let address = derive_address(&key.verifying_key());
        Self { key, address }
    }

    /// Seed to persist and later pass to [`LocalSigner::from_seed`]
    pub fn seed(&self) -> [u8; 32] {
        self.key.to_bytes()
    }

    /// Public verification key
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Verify a signature over a request
    pub fn verify(&self, request: &DecryptRequest, signature: &[u8]) -> FheResult<()> {
        let signature = Signature::from_slice(signature)
            .map_err(|e| FheError::SignatureRejected(e.to_string()))?;
        self.key
            .verifying_key()
            .verify(&request.digest(), &signature)
            .map_err(|e| FheError::SignatureRejected(e.to_string()))
    }
}

#[async_trait]
impl SigningIdentity for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_decrypt_request(&self, request: &DecryptRequest) -> FheResult<Vec<u8>> {
        if request.user != self.address {
            return Err(FheError::SignatureRejected(format!(
                "request is for {}, signer is {}",
                request.user, self.address
            )));
        }
        Ok(self.key.sign(&request.digest()).to_bytes().to_vec())
    }
}

/// Last 20 bytes of the Keccak-256 of the verifying key
fn derive_address(key: &VerifyingKey) -> Address {
    let digest = Keccak256::digest(key.as_bytes());
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[12..]);
    Address(out)
}

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract() -> Address {
        Address([0xcc; 20])
    }

    #[tokio::test]
    async fn test_authorize_and_verify() {
        let signer = LocalSigner::from_seed([7u8; 32]);
        let (keypair, auth) = authorize(&signer, contract(), 1_000).await.unwrap();

        assert_eq!(auth.request.public_key, keypair.public_key());
        assert_eq!(auth.request.user, signer.address());
        assert!(auth.check(&contract(), 1_000).is_ok());
        signer.verify(&auth.request, &auth.signature).unwrap();
    }

    #[tokio::test]
    async fn test_window_and_binding() {
        let signer = LocalSigner::from_seed([7u8; 32]);
        let (_, auth) = authorize(&signer, contract(), 1_000).await.unwrap();

        let expiry = 1_000 + DEFAULT_DURATION_DAYS * SECONDS_PER_DAY;
        assert!(auth.check(&contract(), expiry - 1).is_ok());
        assert!(matches!(
            auth.check(&contract(), expiry),
            Err(FheError::AuthorizationExpired { .. })
        ));
        assert!(matches!(
            auth.check(&contract(), 999),
            Err(FheError::AuthorizationExpired { .. })
        ));
        assert!(matches!(
            auth.check(&Address([1u8; 20]), 1_000),
            Err(FheError::ContractNotAuthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_tampered_request_is_rejected() {
        let signer = LocalSigner::from_seed([3u8; 32]);
        let (_, mut auth) = authorize(&signer, contract(), 50).await.unwrap();

        auth.request.duration_days = 365;
        assert!(signer.verify(&auth.request, &auth.signature).is_err());

        auth.signature.clear();
        assert!(matches!(
            auth.check(&contract(), 50),
            Err(FheError::SignatureRejected(_))
        ));
    }

    #[test]
    fn test_signer_address_is_stable() {
        let a = LocalSigner::from_seed([1u8; 32]);
        let b = LocalSigner::from_seed([1u8; 32]);
        let c = LocalSigner::from_seed([2u8; 32]);

        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), c.address());
    }
}
