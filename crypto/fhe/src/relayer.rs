//! Relayer-backed gateway
//!
//! The relayer SDK is an external component; [`RelayerBackend`] is the narrow
//! surface we need from it. [`RelayerGateway`] owns everything around that
//! surface: decoding the SDK's result shapes, building and signing the
//! decrypt authorization, and mapping failures into [`FheError`].

use crate::auth::{authorize, unix_now, DecryptAuthorization, DecryptKeypair, SigningIdentity};
use crate::errors::{FheError, FheResult};
use crate::gateway::{EncryptionGateway, GatewayConnector};
use crate::input::EncryptedInput;
use crate::mock::{MockConfig, MockGateway};
use crate::sdk::{decode_decrypt_result, decode_encrypt_result};
use async_trait::async_trait;
use secretbox_primitives::{Address, Handle};
use serde_json::Value;
use std::sync::Arc;

/// Raw operations of the relayer SDK
#[async_trait]
pub trait RelayerBackend: Send + Sync {
    /// Load the SDK and create an instance for the target network
    async fn init(&self) -> FheResult<()>;

    /// Build and encrypt a single `uint8` input; returns the SDK's raw result
    async fn encrypt_u8(&self, contract: &Address, user: &Address, value: u8) -> FheResult<Value>;

    /// Run a user decryption; returns the SDK's raw handle → plaintext map
    async fn user_decrypt(
        &self,
        handle: &Handle,
        contract: &Address,
        keypair: &DecryptKeypair,
        authorization: &DecryptAuthorization,
    ) -> FheResult<Value>;
}

/// Gateway speaking to a relayer through a [`RelayerBackend`]
pub struct RelayerGateway {
    backend: Arc<dyn RelayerBackend>,
}

impl RelayerGateway {
    pub fn new(backend: Arc<dyn RelayerBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl EncryptionGateway for RelayerGateway {
    fn name(&self) -> &'static str {
        "relayer"
    }

    async fn encrypt_u8(
        &self,
        value: u8,
        contract: &Address,
        user: &Address,
    ) -> FheResult<EncryptedInput> {
        let raw = self.backend.encrypt_u8(contract, user, value).await?;
        let input = decode_encrypt_result(raw)?;
        tracing::debug!(
            %contract,
            %user,
            handle = %input.payload,
            proof_len = input.proof.len(),
            "encrypted input"
        );
        Ok(input)
    }

    async fn decrypt(
        &self,
        handle: &Handle,
        contract: &Address,
        signer: &dyn SigningIdentity,
    ) -> FheResult<u64> {
        let now = unix_now();
        let (keypair, authorization) = authorize(signer, *contract, now).await?;
        authorization.check(contract, now)?;

        let raw = self
            .backend
            .user_decrypt(handle, contract, &keypair, &authorization)
            .await
            .map_err(|e| {
                tracing::error!(%handle, error = %e, "user decryption failed");
                e
            })?;
        decode_decrypt_result(raw, handle)
    }
}

/// Connector that prefers the relayer and falls back to the mock gateway
pub struct RelayerConnector {
    backend: Option<Arc<dyn RelayerBackend>>,
    fallback: MockConfig,
}

impl RelayerConnector {
    pub fn new(backend: Option<Arc<dyn RelayerBackend>>, fallback: MockConfig) -> Self {
        Self { backend, fallback }
    }

    /// No relayer available; always yields the mock gateway
    pub fn mock_only(fallback: MockConfig) -> Self {
        Self::new(None, fallback)
    }
}

#[async_trait]
impl GatewayConnector for RelayerConnector {
    async fn connect(&self) -> FheResult<Arc<dyn EncryptionGateway>> {
        let backend = match &self.backend {
            Some(backend) => backend.clone(),
            None => {
                tracing::warn!("relayer SDK not loaded, using mock gateway");
                return Ok(Arc::new(MockGateway::new(self.fallback.clone())));
            }
        };

        match backend.init().await {
            Ok(()) => {
                tracing::info!("relayer gateway initialized");
                Ok(Arc::new(RelayerGateway::new(backend)))
            }
            Err(e) => {
                tracing::warn!(error = %e, "relayer init failed, using mock gateway");
                Ok(Arc::new(MockGateway::new(self.fallback.clone())))
            }
        }
    }
}
