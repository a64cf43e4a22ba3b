//! Encryption gateway contract and its lazily-connected handle

use crate::auth::SigningIdentity;
use crate::errors::{FheError, FheResult};
use crate::input::EncryptedInput;
use async_trait::async_trait;
use secretbox_primitives::{Address, Handle};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Capability that encrypts inputs for a contract and decrypts result handles
#[async_trait]
pub trait EncryptionGateway: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Encrypt an 8-bit value for `contract`, scoped to `user`
    async fn encrypt_u8(
        &self,
        value: u8,
        contract: &Address,
        user: &Address,
    ) -> FheResult<EncryptedInput>;

    /// Decrypt a result handle held by `contract` on behalf of `signer`
    async fn decrypt(
        &self,
        handle: &Handle,
        contract: &Address,
        signer: &dyn SigningIdentity,
    ) -> FheResult<u64>;
}

/// Produces a gateway instance on first use
#[async_trait]
pub trait GatewayConnector: Send + Sync {
    async fn connect(&self) -> FheResult<Arc<dyn EncryptionGateway>>;
}

/// Owned gateway handle that connects at most once.
///
/// The session manager creates one of these and shares it with every session
/// it drives; the first encryption stage pays the connection cost and later
/// stages reuse the cached instance.
pub struct LazyGateway {
    connector: Option<Arc<dyn GatewayConnector>>,
    cell: OnceCell<Arc<dyn EncryptionGateway>>,
}

impl LazyGateway {
    /// Connect on first use through `connector`
    pub fn new(connector: Arc<dyn GatewayConnector>) -> Self {
        Self {
            connector: Some(connector),
            cell: OnceCell::new(),
        }
    }

    /// Wrap an already connected gateway
    pub fn ready(gateway: Arc<dyn EncryptionGateway>) -> Self {
        Self {
            connector: None,
            cell: OnceCell::new_with(Some(gateway)),
        }
    }

    /// Whether a gateway instance has been created
    pub fn is_connected(&self) -> bool {
        self.cell.initialized()
    }

    /// Get the gateway, connecting if this is the first call
    pub async fn get(&self) -> FheResult<Arc<dyn EncryptionGateway>> {
        let gateway = self
            .cell
            .get_or_try_init(|| async {
                let connector = self
                    .connector
                    .as_ref()
                    .ok_or_else(|| FheError::Unavailable("no gateway connector".into()))?;
                tracing::info!("connecting encryption gateway");
                connector.connect().await
            })
            .await?;
        Ok(gateway.clone())
    }
}
