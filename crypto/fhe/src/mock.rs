//! Mock encryption gateway
//!
//! Stands in for the relayer SDK when it is not available. Keeps the exact
//! operation signatures and a small non-zero latency on both operations so
//! the session pipeline goes through the same suspension points.

use crate::auth::{authorize, unix_now, SigningIdentity};
use crate::errors::{FheError, FheResult};
use crate::gateway::EncryptionGateway;
use crate::input::EncryptedInput;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::RngCore;
use secretbox_primitives::{Address, Handle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Rewards the mock draws from
pub const MOCK_REWARDS: [u64; 7] = [100, 250, 500, 1000, 2500, 5000, 10000];

/// Mock gateway configuration
#[derive(Clone, Debug)]
pub struct MockConfig {
    /// Latency of `encrypt_u8`
    pub encrypt_delay: Duration,
    /// Latency of `decrypt`
    pub decrypt_delay: Duration,
    /// Proof length in bytes
    pub proof_len: usize,
    /// Reward table
    pub rewards: Vec<u64>,
    /// Always return this reward instead of drawing one
    pub fixed_reward: Option<u64>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            encrypt_delay: Duration::from_millis(500),
            decrypt_delay: Duration::from_millis(1000),
            proof_len: 64,
            rewards: MOCK_REWARDS.to_vec(),
            fixed_reward: None,
        }
    }
}

impl MockConfig {
    /// Minimal delays, for tests
    pub fn instant() -> Self {
        Self {
            encrypt_delay: Duration::from_millis(1),
            decrypt_delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    /// Always decrypt to `reward`
    pub fn with_fixed_reward(mut self, reward: u64) -> Self {
        self.fixed_reward = Some(reward);
        self
    }
}

/// Gateway producing random handles and drawing rewards from a table
pub struct MockGateway {
    config: MockConfig,
    encryptions: AtomicU64,
    decryptions: AtomicU64,
}

impl MockGateway {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            encryptions: AtomicU64::new(0),
            decryptions: AtomicU64::new(0),
        }
    }

    /// Number of successful encryptions
    pub fn encryptions(&self) -> u64 {
        self.encryptions.load(Ordering::Relaxed)
    }

    /// Number of successful decryptions
    pub fn decryptions(&self) -> u64 {
        self.decryptions.load(Ordering::Relaxed)
    }

    fn draw_reward(&self) -> FheResult<u64> {
        if let Some(reward) = self.config.fixed_reward {
            return Ok(reward);
        }
        self.config
            .rewards
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or_else(|| FheError::ConfigError("mock reward table is empty".into()))
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

#[async_trait]
impl EncryptionGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn encrypt_u8(
        &self,
        value: u8,
        contract: &Address,
        user: &Address,
    ) -> FheResult<EncryptedInput> {
        tracing::debug!(%contract, %user, value, "mock encrypt");
        tokio::time::sleep(self.config.encrypt_delay).await;

        let mut handle = [0u8; 32];
        let mut proof = vec![0u8; self.config.proof_len];
        {
            let mut rng = rand::thread_rng();
            rng.fill_bytes(&mut handle);
            rng.fill_bytes(&mut proof);
        }

        self.encryptions.fetch_add(1, Ordering::Relaxed);
        Ok(EncryptedInput::new(Handle(handle), proof))
    }

    async fn decrypt(
        &self,
        handle: &Handle,
        contract: &Address,
        signer: &dyn SigningIdentity,
    ) -> FheResult<u64> {
        let now = unix_now();
        let (_keypair, authorization) = authorize(signer, *contract, now).await?;
        authorization.check(contract, now)?;

        tokio::time::sleep(self.config.decrypt_delay).await;
        let reward = self.draw_reward()?;

        tracing::debug!(%handle, reward, "mock decrypt");
        self.decryptions.fetch_add(1, Ordering::Relaxed);
        Ok(reward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{DecryptRequest, LocalSigner};

    struct UnsignedIdentity;

    #[async_trait]
    impl SigningIdentity for UnsignedIdentity {
        fn address(&self) -> Address {
            Address([1u8; 20])
        }

        async fn sign_decrypt_request(&self, _request: &DecryptRequest) -> FheResult<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_encrypt_shape() {
        let gateway = MockGateway::new(MockConfig::instant());
        let input = gateway
            .encrypt_u8(3, &Address([0xcc; 20]), &Address([1u8; 20]))
            .await
            .unwrap();

        assert_eq!(input.proof.len(), 64);
        assert_eq!(gateway.encryptions(), 1);
    }

    #[tokio::test]
    async fn test_decrypt_draws_from_table() {
        let gateway = MockGateway::new(MockConfig::instant());
        let signer = LocalSigner::from_seed([5u8; 32]);

        let reward = gateway
            .decrypt(&Handle([1u8; 32]), &Address([0xcc; 20]), &signer)
            .await
            .unwrap();

        assert!(MOCK_REWARDS.contains(&reward));
        assert_eq!(gateway.decryptions(), 1);
    }

    #[tokio::test]
    async fn test_fixed_reward() {
        let gateway = MockGateway::new(MockConfig::instant().with_fixed_reward(250));
        let signer = LocalSigner::from_seed([5u8; 32]);

        let reward = gateway
            .decrypt(&Handle([1u8; 32]), &Address([0xcc; 20]), &signer)
            .await
            .unwrap();
        assert_eq!(reward, 250);
    }

    #[tokio::test]
    async fn test_unsigned_decrypt_fails() {
        let gateway = MockGateway::new(MockConfig::instant());
        let err = gateway
            .decrypt(&Handle([1u8; 32]), &Address([0xcc; 20]), &UnsignedIdentity)
            .await
            .unwrap_err();

        assert!(matches!(err, FheError::SignatureRejected(_)));
        assert_eq!(gateway.decryptions(), 0);
    }

    #[tokio::test]
    async fn test_empty_table_is_config_error() {
        let config = MockConfig { rewards: Vec::new(), ..MockConfig::instant() };
        let gateway = MockGateway::new(config);
        let signer = LocalSigner::from_seed([5u8; 32]);

        let err = gateway
            .decrypt(&Handle([1u8; 32]), &Address([0xcc; 20]), &signer)
            .await
            .unwrap_err();
        assert!(matches!(err, FheError::ConfigError(_)));
    }
}
