//! Session Integration Tests for SecretBox
//!
//! End-to-end tests of the box-opening pipeline with stub capabilities:
//! - Successful runs and counter updates
//! - Stage failures and error normalisation
//! - Open limit, invalid selections and the catalog fallback
//! - Reset and identity switching
//! - Persistence across restarts and best-effort writes

use async_trait::async_trait;
use parking_lot::Mutex;
use secretbox::catalog::BoxCatalog;
use secretbox::config::LIMIT_REACHED_MESSAGE;
use secretbox::prelude::*;
use secretbox::contracts::ChainOp;
use secretbox::fhe::{EncryptedInput, FheError, FheResult, GatewayConnector};
use secretbox::storage::{KeyValueBackend, MemoryBackend, RedbBackend};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

const CONTRACT: Address = Address::new([0xcc; 20]);

// =============================================================================
// STUBS
// =============================================================================

/// Gateway returning a fixed reward and recording the handles it decrypts
struct StubGateway {
    reward: u64,
    decrypted: Mutex<Vec<Handle>>,
    hold_decrypt: Option<Arc<Notify>>,
}

impl StubGateway {
    fn new(reward: u64) -> Self {
        Self {
            reward,
            decrypted: Mutex::new(Vec::new()),
            hold_decrypt: None,
        }
    }

    fn holding(reward: u64, gate: Arc<Notify>) -> Self {
        Self {
            hold_decrypt: Some(gate),
            ..Self::new(reward)
        }
    }
}

#[async_trait]
impl EncryptionGateway for StubGateway {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn encrypt_u8(&self, value: u8, _contract: &Address, user: &Address) -> FheResult<EncryptedInput> {
        let mut handle = [0u8; 32];
        handle[..20].copy_from_slice(user.as_bytes());
        handle[31] = value;
        Ok(EncryptedInput::new(Handle(handle), vec![0xab; 64]))
    }

    async fn decrypt(&self, handle: &Handle, _contract: &Address, _signer: &dyn SigningIdentity) -> FheResult<u64> {
        if let Some(gate) = &self.hold_decrypt {
            gate.notified().await;
        }
        self.decrypted.lock().push(*handle);
        Ok(self.reward)
    }
}

struct CountingConnector {
    connects: AtomicUsize,
    reward: u64,
}

#[async_trait]
impl GatewayConnector for CountingConnector {
    async fn connect(&self) -> FheResult<Arc<dyn EncryptionGateway>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StubGateway::new(self.reward)))
    }
}

struct FailingConnector;

#[async_trait]
impl GatewayConnector for FailingConnector {
    async fn connect(&self) -> FheResult<Arc<dyn EncryptionGateway>> {
        Err(FheError::Unavailable("relayer offline".into()))
    }
}

struct Fixture {
    chain: Arc<InMemoryChain>,
    backend: Arc<MemoryBackend>,
    store: Arc<ProgressStore>,
    gateway: Arc<StubGateway>,
}

impl Fixture {
    fn new(reward: u64) -> Self {
        Self::with_gateway(StubGateway::new(reward), 5)
    }

    fn with_gateway(gateway: StubGateway, boxes: u8) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        Self {
            chain: Arc::new(InMemoryChain::new(CONTRACT, boxes)),
            store: Arc::new(ProgressStore::new(backend.clone(), MAX_OPENS)),
            backend,
            gateway: Arc::new(gateway),
        }
    }

    fn context(&self) -> SessionContext {
        SessionContext::new(
            Arc::new(LazyGateway::ready(self.gateway.clone())),
            self.chain.clone(),
            self.store.clone(),
            SessionConfig::default().with_contract(CONTRACT),
        )
    }

    fn session(&self) -> BoxSession {
        BoxSession::new(self.context())
    }
}

fn signer(seed: u8) -> Arc<LocalSigner> {
    Arc::new(LocalSigner::from_seed([seed; 32]))
}

// =============================================================================
// PIPELINE TESTS
// =============================================================================

mod pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_full_run_reveals_reward() {
        let fx = Fixture::new(250);
        let session = fx.session();
        let alice = signer(1);

        session.open_box(3, alice.clone()).await.unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.state, SessionState::Revealed);
        assert_eq!(snap.reward, Some(250));
        assert_eq!(snap.selected_box, Some(3));
        assert_eq!(snap.boxes_opened, 1);
        assert_eq!(snap.total_reward, 250);
        assert_eq!(snap.error_message, None);

        let stored = fx.store.load(&alice.address().key());
        assert_eq!(stored, UserProgress { boxes_opened: 1, total_reward: 250 });
    }

    #[tokio::test]
    async fn test_decrypts_the_predicted_handle() {
        let fx = Fixture::new(100);
        let session = fx.session();

        session.open_box(1, signer(1)).await.unwrap();

        let tx = session.snapshot().transaction_ref.unwrap();
        let on_chain = fx.chain.result_handle(&tx).unwrap();
        assert_eq!(*fx.gateway.decrypted.lock(), vec![on_chain]);
        assert!(fx.chain.is_confirmed(&tx));
    }

    #[tokio::test]
    async fn test_transition_order() {
        let fx = Fixture::new(100);
        let (tx, mut rx) = mpsc::channel(64);
        let session = fx.session().with_events(tx);

        session.open_box(0, signer(1)).await.unwrap();
        drop(session);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        let transitions: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Transition { to, .. } => Some(*to),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![
                SessionState::Encrypting,
                SessionState::Sending,
                SessionState::Confirming,
                SessionState::Decrypting,
                SessionState::Revealed,
            ]
        );

        // the transaction is visible before confirmation starts
        let sent = events
            .iter()
            .position(|e| matches!(e, SessionEvent::TransactionSent { .. }))
            .unwrap();
        let confirming = events
            .iter()
            .position(|e| matches!(e, SessionEvent::Transition { to: SessionState::Confirming, .. }))
            .unwrap();
        assert!(sent < confirming);
    }

    #[tokio::test]
    async fn test_gateway_connects_once() {
        let fx = Fixture::new(0);
        let connector = Arc::new(CountingConnector { connects: AtomicUsize::new(0), reward: 500 });
        let gateway = Arc::new(LazyGateway::new(connector.clone()));
        let manager = SessionManager::new(
            gateway.clone(),
            fx.chain.clone(),
            fx.store.clone(),
            SessionConfig::default().with_contract(CONTRACT),
        );
        assert!(!manager.gateway_connected());

        manager.open_box(0, signer(1)).await.unwrap();
        manager.open_box(1, signer(2)).await.unwrap();

        assert!(manager.gateway_connected());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mock_gateway_pipeline() {
        let fx = Fixture::new(0);
        let manager = SessionManager::new(
            Arc::new(LazyGateway::new(Arc::new(RelayerConnector::mock_only(MockConfig::instant())))),
            fx.chain.clone(),
            fx.store.clone(),
            SessionConfig::default().with_contract(CONTRACT),
        );

        let snap = manager.open_box(2, signer(9)).await.unwrap();
        assert_eq!(snap.state, SessionState::Revealed);
        assert!(secretbox::fhe::MOCK_REWARDS.contains(&snap.reward.unwrap()));
        assert_eq!(snap.total_reward, snap.reward.unwrap());
    }
}

// =============================================================================
// FAILURE TESTS
// =============================================================================

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_confirmation_failure() {
        let fx = Fixture::new(250);
        fx.chain.fail(ChainOp::Confirm, "execution reverted");
        let session = fx.session();
        let alice = signer(1);

        session.open_box(2, alice.clone()).await.unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.state, SessionState::Error);
        assert_eq!(snap.failed_stage, Some(SessionState::Confirming));
        assert!(snap.error_message.unwrap().contains("execution reverted"));
        assert_eq!(snap.reward, None);
        assert!(snap.transaction_ref.is_some());
        assert_eq!(snap.boxes_opened, 0);
        assert_eq!(snap.total_reward, 0);
        assert_eq!(fx.store.load(&alice.address().key()), UserProgress::default());
        assert!(fx.gateway.decrypted.lock().is_empty());
    }

    #[tokio::test]
    async fn test_each_stage_failure_lands_in_error() {
        for (op, stage) in [
            (ChainOp::Predict, SessionState::Sending),
            (ChainOp::Submit, SessionState::Sending),
            (ChainOp::Confirm, SessionState::Confirming),
        ] {
            let fx = Fixture::new(250);
            fx.chain.fail(op, "boom");
            let session = fx.session();

            session.open_box(0, signer(1)).await.unwrap();

            let snap = session.snapshot();
            assert_eq!(snap.state, SessionState::Error, "{op:?}");
            assert_eq!(snap.failed_stage, Some(stage), "{op:?}");
            assert_eq!(snap.boxes_opened, 0);
        }
    }

    #[tokio::test]
    async fn test_gateway_connect_failure() {
        let fx = Fixture::new(0);
        let session = BoxSession::new(SessionContext::new(
            Arc::new(LazyGateway::new(Arc::new(FailingConnector))),
            fx.chain.clone(),
            fx.store.clone(),
            SessionConfig::default().with_contract(CONTRACT),
        ));

        session.open_box(0, signer(1)).await.unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.state, SessionState::Error);
        assert_eq!(snap.failed_stage, Some(SessionState::Encrypting));
        assert!(snap.error_message.unwrap().contains("relayer offline"));
        assert_eq!(fx.chain.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_retry_after_failure() {
        let fx = Fixture::new(250);
        fx.chain.fail(ChainOp::Submit, "nonce too low");
        let session = fx.session();
        let alice = signer(1);

        session.open_box(0, alice.clone()).await.unwrap();
        assert_eq!(session.state(), SessionState::Error);

        fx.chain.clear_failure(ChainOp::Submit);
        session.reset();
        session.open_box(0, alice).await.unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.state, SessionState::Revealed);
        assert_eq!(snap.error_message, None);
        assert_eq!(snap.failed_stage, None);
        assert_eq!(snap.boxes_opened, 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_not_fatal() {
        let fx = Fixture::new(250);
        fx.backend.reject_writes(true);
        let session = fx.session();
        let alice = signer(1);

        session.open_box(0, alice.clone()).await.unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.state, SessionState::Revealed);
        assert_eq!(snap.boxes_opened, 1);
        assert_eq!(snap.total_reward, 250);
        assert_eq!(fx.store.write_failures(), 1);
        assert!(fx.backend.is_empty());
        assert!(fx.store.is_unsaved(&alice.address().key()));

        // unsaved counters still gate the next open in this process
        session.reset();
        session.open_box(1, alice.clone()).await.unwrap();
        let snap = session.snapshot();
        assert_eq!((snap.boxes_opened, snap.total_reward), (2, 500));
        assert_eq!(
            fx.store.load(&alice.address().key()),
            UserProgress { boxes_opened: 2, total_reward: 500 }
        );
    }
}

// =============================================================================
// PRECONDITION TESTS
// =============================================================================

mod precondition_tests {
    use super::*;

    #[tokio::test]
    async fn test_limit_reached_changes_nothing() {
        let fx = Fixture::new(250);
        let alice = signer(1);
        fx.store.save(&alice.address().key(), &UserProgress { boxes_opened: 3, total_reward: 1200 });
        let session = fx.session();

        for index in 0..5 {
            session.open_box(index, alice.clone()).await.unwrap();

            let snap = session.snapshot();
            assert_eq!(snap.state, SessionState::Error);
            assert_eq!(snap.error_message.as_deref(), Some(LIMIT_REACHED_MESSAGE));
            assert_eq!(snap.boxes_opened, 3);
            assert_eq!(snap.total_reward, 1200);
            assert!(snap.has_reached_limit);
            assert_eq!(snap.opens_left, 0);
        }
        assert_eq!(fx.chain.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_limit_applies_even_to_invalid_index() {
        let fx = Fixture::new(250);
        let alice = signer(1);
        fx.store.save(&alice.address().key(), &UserProgress { boxes_opened: 3, total_reward: 0 });

        let session = fx.session();
        session.open_box(99, alice).await.unwrap();
        assert_eq!(session.state(), SessionState::Error);
    }

    #[tokio::test]
    async fn test_out_of_range_index_is_usage_error() {
        let fx = Fixture::new(250);
        let session = fx.session();

        let err = session.open_box(5, signer(1)).await.unwrap_err();

        assert_eq!(err, SessionError::InvalidSelection { index: 5, number_of_boxes: 5 });
        let snap = session.snapshot();
        assert_eq!(snap.state, SessionState::Idle);
        assert_eq!(snap.selected_box, None);
        assert_eq!(snap.number_of_boxes, 5);
        assert_eq!(fx.chain.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_catalog_refresh_failure_uses_stale_zero() {
        let fx = Fixture::new(250);
        fx.chain.fail(ChainOp::NumberOfBoxes, "rpc down");
        let session = fx.session();

        let err = session.open_box(0, signer(1)).await.unwrap_err();
        assert_eq!(err, SessionError::InvalidSelection { index: 0, number_of_boxes: 0 });
        assert_eq!(session.state(), SessionState::Idle);

        // the next call retries the refresh
        fx.chain.clear_failure(ChainOp::NumberOfBoxes);
        session.open_box(0, signer(1)).await.unwrap();
        assert_eq!(session.state(), SessionState::Revealed);
    }

    #[tokio::test]
    async fn test_cached_catalog_is_not_reread() {
        // chain now has 2 boxes, cache still says 5: index 4 is accepted
        let fx = Fixture::with_gateway(StubGateway::new(100), 2);
        let session = BoxSession::new(
            fx.context().with_catalog(Arc::new(BoxCatalog::with_boxes(5))),
        );

        session.open_box(4, signer(1)).await.unwrap();
        let snap = session.snapshot();
        assert_eq!(snap.state, SessionState::Revealed);
        assert_eq!(snap.selected_box, Some(4));
        assert_eq!(snap.number_of_boxes, 5);
    }

    #[tokio::test]
    async fn test_error_is_cleared_on_new_attempt() {
        let fx = Fixture::new(250);
        fx.chain.fail(ChainOp::Submit, "boom");
        let session = fx.session();
        session.open_box(0, signer(1)).await.unwrap();
        assert!(session.snapshot().error_message.is_some());

        fx.chain.clear_failure(ChainOp::Submit);
        session.open_box(1, signer(1)).await.unwrap();
        let snap = session.snapshot();
        assert_eq!(snap.state, SessionState::Revealed);
        assert_eq!(snap.error_message, None);
    }
}

// =============================================================================
// RESET AND IDENTITY TESTS
// =============================================================================

mod identity_tests {
    use super::*;

    fn assert_idle(snap: &SessionSnapshot) {
        assert_eq!(snap.state, SessionState::Idle);
        assert_eq!(snap.selected_box, None);
        assert_eq!(snap.reward, None);
        assert_eq!(snap.transaction_ref, None);
        assert_eq!(snap.error_message, None);
    }

    #[tokio::test]
    async fn test_reset_from_every_terminal_state() {
        let fx = Fixture::new(250);
        let session = fx.session();
        let alice = signer(1);

        session.reset();
        assert_idle(&session.snapshot());

        session.open_box(0, alice.clone()).await.unwrap();
        session.reset();
        let snap = session.snapshot();
        assert_idle(&snap);
        assert_eq!((snap.boxes_opened, snap.total_reward), (1, 250));

        fx.chain.fail(ChainOp::Confirm, "reverted");
        session.open_box(1, alice).await.unwrap();
        session.reset();
        let snap = session.snapshot();
        assert_idle(&snap);
        assert_eq!((snap.boxes_opened, snap.total_reward), (1, 250));
    }

    #[tokio::test]
    async fn test_reset_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let fx = Fixture::with_gateway(StubGateway::holding(250, gate.clone()), 5);
        let session = Arc::new(fx.session());
        let alice = signer(1);

        let task = {
            let session = session.clone();
            let alice = alice.clone();
            tokio::spawn(async move { session.open_box(0, alice).await })
        };
        wait_for(&session, SessionState::Decrypting).await;

        session.reset();
        let snap = session.snapshot();
        assert_idle(&snap);
        assert!(snap.settling);
        assert!(session.is_settling());
        assert_eq!(session.open_box(1, alice.clone()).await, Err(SessionError::Settling));

        gate.notify_one();
        task.await.unwrap().unwrap();

        // the pipeline finished on chain, so it still counts
        let snap = session.snapshot();
        assert_idle(&snap);
        assert!(!snap.settling);
        assert_eq!(snap.boxes_opened, 1);
        assert_eq!(snap.total_reward, 250);
        assert_eq!(fx.chain.transaction_count(), 1);

        gate.notify_one();
        session.open_box(1, alice).await.unwrap();
        assert_eq!(session.state(), SessionState::Revealed);
    }

    #[tokio::test]
    async fn test_switching_identity_reloads_counters() {
        let fx = Fixture::new(250);
        let alice = signer(1);
        let bob = signer(2);
        fx.store.save(&bob.address().key(), &UserProgress { boxes_opened: 2, total_reward: 5000 });

        let session = fx.session();
        session.open_box(0, alice.clone()).await.unwrap();
        assert_eq!(session.progress(), UserProgress { boxes_opened: 1, total_reward: 250 });

        session.attach_identity(bob.address());
        assert_eq!(session.identity(), Some(bob.address()));
        assert_eq!(session.progress(), UserProgress { boxes_opened: 2, total_reward: 5000 });

        session.reset();
        session.open_box(0, bob).await.unwrap();
        assert_eq!(session.progress(), UserProgress { boxes_opened: 3, total_reward: 5250 });

        session.attach_identity(alice.address());
        assert_eq!(session.progress(), UserProgress { boxes_opened: 1, total_reward: 250 });
    }

    #[tokio::test]
    async fn test_identity_switch_mid_flight_credits_original() {
        let gate = Arc::new(Notify::new());
        let fx = Fixture::with_gateway(StubGateway::holding(250, gate.clone()), 5);
        let session = Arc::new(fx.session());
        let alice = signer(1);
        let bob = signer(2);

        let task = {
            let session = session.clone();
            let alice = alice.clone();
            tokio::spawn(async move { session.open_box(0, alice).await })
        };
        wait_for(&session, SessionState::Decrypting).await;

        session.attach_identity(bob.address());
        gate.notify_one();
        task.await.unwrap().unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.state, SessionState::Revealed);
        assert_eq!(snap.identity, Some(bob.address()));
        assert_eq!((snap.boxes_opened, snap.total_reward), (0, 0));
        assert_eq!(
            fx.store.load(&alice.address().key()),
            UserProgress { boxes_opened: 1, total_reward: 250 }
        );
        assert_eq!(fx.store.load(&bob.address().key()), UserProgress::default());
    }

    #[tokio::test]
    async fn test_busy_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let fx = Fixture::with_gateway(StubGateway::holding(250, gate.clone()), 5);
        let session = Arc::new(fx.session());

        let task = {
            let session = session.clone();
            let alice = signer(1);
            tokio::spawn(async move { session.open_box(0, alice).await })
        };
        wait_for(&session, SessionState::Decrypting).await;

        assert_eq!(
            session.open_box(1, signer(1)).await,
            Err(SessionError::Busy(SessionState::Decrypting))
        );

        gate.notify_one();
        task.await.unwrap().unwrap();
        assert_eq!(session.snapshot().boxes_opened, 1);
        assert_eq!(fx.chain.transaction_count(), 1);
    }

    #[tokio::test]
    async fn test_two_sessions_share_one_limit() {
        let fx = Fixture::new(200);
        let ctx = fx.context();
        let first = BoxSession::new(ctx.clone());
        let second = BoxSession::new(ctx);
        let alice = signer(1);

        // both sessions load alice at 0/0 before either opens
        first.attach_identity(alice.address());
        second.attach_identity(alice.address());

        let mut revealed = 0;
        for round in 0..3u32 {
            for session in [&first, &second] {
                session.reset();
                session.open_box(round, alice.clone()).await.unwrap();
                revealed += session.snapshot().reward.unwrap_or(0);
            }
        }

        assert_eq!(fx.chain.transaction_count(), 3);
        assert_eq!(revealed, 600);
        let stored = fx.store.load(&alice.address().key());
        assert_eq!(stored, UserProgress { boxes_opened: 3, total_reward: revealed });
        for session in [&first, &second] {
            let snap = session.snapshot();
            assert_eq!((snap.boxes_opened, snap.total_reward), (3, 600));
            assert!(snap.has_reached_limit);
        }
        assert_eq!(second.snapshot().error_message.as_deref(), Some(LIMIT_REACHED_MESSAGE));
    }

    #[tokio::test]
    async fn test_one_pipeline_per_identity_across_sessions() {
        let gate = Arc::new(Notify::new());
        let fx = Fixture::with_gateway(StubGateway::holding(250, gate.clone()), 5);
        let ctx = fx.context();
        let first = Arc::new(BoxSession::new(ctx.clone()));
        let second = BoxSession::new(ctx);
        let alice = signer(1);

        let task = {
            let first = first.clone();
            let alice = alice.clone();
            tokio::spawn(async move { first.open_box(0, alice).await })
        };
        wait_for(&first, SessionState::Decrypting).await;

        assert_eq!(
            second.open_box(1, alice.clone()).await,
            Err(SessionError::IdentityBusy(alice.address()))
        );
        assert_eq!(second.state(), SessionState::Idle);

        gate.notify_one();
        task.await.unwrap().unwrap();

        // the claim is released with the first pipeline
        let second = Arc::new(second);
        let task = {
            let second = second.clone();
            let alice = alice.clone();
            tokio::spawn(async move { second.open_box(1, alice).await })
        };
        wait_for(&second, SessionState::Decrypting).await;
        assert_eq!(second.progress().boxes_opened, 1);
        gate.notify_one();
        task.await.unwrap().unwrap();

        assert_eq!(fx.chain.transaction_count(), 2);
        assert_eq!(
            fx.store.load(&alice.address().key()),
            UserProgress { boxes_opened: 2, total_reward: 500 }
        );
        assert_eq!(first.progress().boxes_opened, 1);
        assert_eq!(second.progress().boxes_opened, 2);
    }

    async fn wait_for(session: &BoxSession, state: SessionState) {
        for _ in 0..500 {
            if session.state() == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("session never reached {state}");
    }
}

// =============================================================================
// PERSISTENCE TESTS
// =============================================================================

mod persistence_tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_progress_survives_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.db");
        let alice = signer(1);

        {
            let backend: Arc<dyn KeyValueBackend> = Arc::new(RedbBackend::open(&path).unwrap());
            let manager = SessionManager::new(
                Arc::new(LazyGateway::ready(Arc::new(StubGateway::new(1000)))),
                Arc::new(InMemoryChain::new(CONTRACT, 5)),
                Arc::new(ProgressStore::new(backend, MAX_OPENS)),
                SessionConfig::default().with_contract(CONTRACT),
            );
            manager.open_box(0, alice.clone()).await.unwrap();
            manager.reset(&alice.address());
            manager.open_box(1, alice.clone()).await.unwrap();
        }

        let backend: Arc<dyn KeyValueBackend> = Arc::new(RedbBackend::open(&path).unwrap());
        let manager = SessionManager::new(
            Arc::new(LazyGateway::ready(Arc::new(StubGateway::new(1000)))),
            Arc::new(InMemoryChain::new(CONTRACT, 5)),
            Arc::new(ProgressStore::new(backend, MAX_OPENS)),
            SessionConfig::default().with_contract(CONTRACT),
        );
        let snap = manager.session(alice.address()).snapshot();
        assert_eq!(snap.boxes_opened, 2);
        assert_eq!(snap.total_reward, 2000);
        assert_eq!(snap.opens_left, 1);

        manager.open_box(2, alice.clone()).await.unwrap();
        manager.reset(&alice.address());
        manager.open_box(3, alice.clone()).await.unwrap();
        let snap = manager.session(alice.address()).snapshot();
        assert_eq!(snap.state, SessionState::Error);
        assert_eq!(snap.boxes_opened, 3);
        assert_eq!(snap.total_reward, 3000);
    }

    #[tokio::test]
    async fn test_keys_are_lowercased_identity() {
        let fx = Fixture::new(250);
        let alice = signer(1);
        fx.session().open_box(0, alice.clone()).await.unwrap();

        let hex = alice.address().to_hex();
        assert_eq!(
            fx.backend.get(&format!("secretbox-boxes-opened-{hex}")).unwrap().as_deref(),
            Some("1")
        );
        assert_eq!(
            fx.backend.get(&format!("secretbox-total-reward-{hex}")).unwrap().as_deref(),
            Some("250")
        );
    }
}
