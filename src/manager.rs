//! Session manager
//!
//! Owns the capabilities every session shares (the lazily-connected
//! encryption gateway, the chain adapter, the progress store, the box
//! catalog and metrics) and hands out one [`BoxSession`] per identity.
//! Callers asking for the same identity get the same session, so pipelines
//! and counter updates for one identity never interleave.

use crate::catalog::BoxCatalog;
use crate::config::SessionConfig;
use crate::metrics::SessionMetrics;
use crate::session::{BoxSession, SessionContext, SessionEvent, SessionSnapshot};
use parking_lot::RwLock;
use secretbox_contracts::{ChainAdapter, ChainResult};
use secretbox_fhe::{LazyGateway, SigningIdentity};
use secretbox_primitives::Address;
use secretbox_storage::ProgressStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct SessionManager {
    ctx: SessionContext,
    sessions: RwLock<HashMap<Address, Arc<BoxSession>>>,
    event_tx: Option<mpsc::Sender<SessionEvent>>,
}

impl SessionManager {
    pub fn new(
        gateway: Arc<LazyGateway>,
        chain: Arc<dyn ChainAdapter>,
        store: Arc<ProgressStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            ctx: SessionContext::new(gateway, chain, store, config),
            sessions: RwLock::new(HashMap::new()),
            event_tx: None,
        }
    }

    /// Forward events of every session created from now on to `tx`
    pub fn with_events(mut self, tx: mpsc::Sender<SessionEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.ctx.config
    }

    pub fn metrics(&self) -> Arc<SessionMetrics> {
        self.ctx.metrics.clone()
    }

    pub fn catalog(&self) -> Arc<BoxCatalog> {
        self.ctx.catalog.clone()
    }

    pub fn store(&self) -> Arc<ProgressStore> {
        self.ctx.store.clone()
    }

    /// Whether the encryption gateway has been connected yet
    pub fn gateway_connected(&self) -> bool {
        self.ctx.gateway.is_connected()
    }

    /// Session of `identity`, created with its stored counters on first use
    pub fn session(&self, identity: Address) -> Arc<BoxSession> {
        if let Some(session) = self.sessions.read().get(&identity) {
            return session.clone();
        }

        let mut sessions = self.sessions.write();
        let session = sessions
            .entry(identity)
            .or_insert_with(|| {
                let mut session = BoxSession::new(self.ctx.clone());
                if let Some(tx) = &self.event_tx {
                    session = session.with_events(tx.clone());
                }
                Arc::new(session.bound_to(identity))
            })
            .clone();
        self.ctx.metrics.sessions_active.set(sessions.len() as u64);
        session
    }

    /// Open box `index` in the session of `signer`
    pub async fn open_box(
        &self,
        index: u32,
        signer: Arc<dyn SigningIdentity>,
    ) -> crate::SessionResult<SessionSnapshot> {
        let session = self.session(signer.address());
        session.open_box(index, signer).await?;
        Ok(session.snapshot())
    }

    /// Reset the session of `identity`, if there is one
    pub fn reset(&self, identity: &Address) {
        if let Some(session) = self.sessions.read().get(identity) {
            session.reset();
        }
    }

    /// Drop the session of `identity`; a later call starts from stored counters
    pub fn disconnect(&self, identity: &Address) -> Option<Arc<BoxSession>> {
        let mut sessions = self.sessions.write();
        let removed = sessions.remove(identity);
        self.ctx.metrics.sessions_active.set(sessions.len() as u64);
        removed
    }

    /// Read `numberOfBoxes` from the chain into the shared catalog
    pub async fn refresh_catalog(&self) -> ChainResult<u8> {
        let result = self.ctx.catalog.refresh(self.ctx.chain.as_ref()).await;
        if result.is_err() {
            self.ctx.metrics.catalog_refresh_failures_total.inc();
        }
        result
    }

    /// Snapshots of every live session
    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        self.sessions.read().values().map(|s| s.snapshot()).collect()
    }
}
