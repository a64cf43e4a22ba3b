//! Box Session State Machine
//!
//! Turns a box selection into an encrypted `openBox` call and resolves the
//! private reward:
//!
//! ```text
//! idle → encrypting → sending → confirming → decrypting → revealed
//!            └────────────┴───────────┴────────────┴──────→ error
//! ```
//!
//! Preconditions are checked synchronously before the first suspension point.
//! Each stage is awaited to completion before the next one starts, and any
//! stage failure ends the pipeline in `error` with the failure's message.
//! Only one pipeline runs per session at a time; a second `open_box` while
//! one is in flight is rejected with [`SessionError::Busy`]. Sessions built
//! from one [`SessionContext`] also run at most one pipeline per identity,
//! and credit rewards through the store's atomic update, so the open limit
//! holds across sessions.

use crate::catalog::BoxCatalog;
use crate::config::{SessionConfig, LIMIT_REACHED_MESSAGE, UNKNOWN_ERROR_MESSAGE};
use crate::errors::{SessionError, SessionResult};
use crate::metrics::{SessionMetrics, Timer};
use parking_lot::RwLock;
use secretbox_contracts::{ChainAdapter, ChainResult};
use secretbox_fhe::{LazyGateway, SigningIdentity};
use secretbox_primitives::{Address, Handle, TxHash};
use secretbox_storage::{ProgressStore, UserProgress};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};

/// Session states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Encrypting,
    Sending,
    Confirming,
    Decrypting,
    Revealed,
    Error,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Encrypting => "encrypting",
            SessionState::Sending => "sending",
            SessionState::Confirming => "confirming",
            SessionState::Decrypting => "decrypting",
            SessionState::Revealed => "revealed",
            SessionState::Error => "error",
        }
    }

    /// `revealed` or `error`
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Revealed | SessionState::Error)
    }

    /// One of the four pipeline stages
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            SessionState::Encrypting
                | SessionState::Sending
                | SessionState::Confirming
                | SessionState::Decrypting
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session events, emitted in the order they happen
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Counters were (re)loaded for a new identity
    IdentityAttached { identity: Address, progress: UserProgress },
    /// State changed
    Transition { from: SessionState, to: SessionState },
    /// The `openBox` transaction was submitted
    TransactionSent { tx: TxHash },
    /// Reward decrypted and counters updated
    Revealed { reward: u64, progress: UserProgress },
    /// Session ended in `error`
    Failed { stage: Option<SessionState>, message: String },
    /// Session returned to `idle` on request
    Reset,
}

/// Identities with a pipeline in flight
#[derive(Default)]
pub struct InFlight {
    identities: parking_lot::Mutex<HashMap<Address, Arc<Mutex<()>>>>,
}

impl InFlight {
    /// Claim `identity` until the returned guard drops; `None` if taken
    fn claim(&self, identity: Address) -> Option<OwnedMutexGuard<()>> {
        let slot = self.identities.lock().entry(identity).or_default().clone();
        slot.try_lock_owned().ok()
    }
}

/// Everything a session needs from its surroundings
#[derive(Clone)]
pub struct SessionContext {
    pub gateway: Arc<LazyGateway>,
    pub chain: Arc<dyn ChainAdapter>,
    pub store: Arc<ProgressStore>,
    pub catalog: Arc<BoxCatalog>,
    pub metrics: Arc<SessionMetrics>,
    pub in_flight: Arc<InFlight>,
    pub config: SessionConfig,
}

impl SessionContext {
    pub fn new(
        gateway: Arc<LazyGateway>,
        chain: Arc<dyn ChainAdapter>,
        store: Arc<ProgressStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            gateway,
            chain,
            store,
            catalog: Arc::new(BoxCatalog::new()),
            metrics: Arc::new(SessionMetrics::new()),
            in_flight: Arc::new(InFlight::default()),
            config,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<BoxCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<SessionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Observable state of the current attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SessionView {
    state: SessionState,
    selected_box: Option<u32>,
    reward: Option<u64>,
    transaction_ref: Option<TxHash>,
    error_message: Option<String>,
    failed_stage: Option<SessionState>,
}

struct Inner {
    view: SessionView,
    identity: Option<Address>,
    progress: UserProgress,
    /// Bumped whenever a pipeline starts or the session is reset; a pipeline
    /// only writes the view while its generation is current
    generation: u64,
    /// Generation of the pipeline still running, if any
    running: Option<u64>,
}

impl Inner {
    /// A reset left a pipeline running behind the current view
    fn is_settling(&self) -> bool {
        matches!(self.running, Some(g) if g != self.generation)
    }
}

/// Everything a caller can read from a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub identity: Option<Address>,
    pub state: SessionState,
    pub selected_box: Option<u32>,
    pub reward: Option<u64>,
    pub transaction_ref: Option<TxHash>,
    pub error_message: Option<String>,
    pub failed_stage: Option<SessionState>,
    pub boxes_opened: u32,
    pub total_reward: u64,
    pub max_opens: u32,
    pub opens_left: u32,
    pub has_reached_limit: bool,
    pub number_of_boxes: u8,
    /// A pipeline abandoned by reset is still running
    pub settling: bool,
}

/// Failure of one pipeline stage
struct StageFailure {
    stage: SessionState,
    message: String,
}

impl StageFailure {
    fn new(stage: SessionState, err: impl fmt::Display) -> Self {
        let message = err.to_string();
        let message = if message.trim().is_empty() {
            UNKNOWN_ERROR_MESSAGE.to_string()
        } else {
            message
        };
        Self { stage, message }
    }
}

/// One box-opening session
pub struct BoxSession {
    ctx: SessionContext,
    inner: RwLock<Inner>,
    pipeline: Mutex<()>,
    /// Only this identity may sign for the session
    bound: Option<Address>,
    event_tx: Option<mpsc::Sender<SessionEvent>>,
}

impl BoxSession {
    /// Idle session with no identity attached
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            inner: RwLock::new(Inner {
                view: SessionView::default(),
                identity: None,
                progress: UserProgress::default(),
                generation: 0,
                running: None,
            }),
            pipeline: Mutex::new(()),
            bound: None,
            event_tx: None,
        }
    }

    /// Idle session with `identity` attached and its counters loaded
    pub fn for_identity(ctx: SessionContext, identity: Address) -> Self {
        let session = Self::new(ctx);
        session.attach_identity(identity);
        session
    }

    /// Attach `identity` and refuse to open boxes for any other signer
    pub fn bound_to(mut self, identity: Address) -> Self {
        self.bound = Some(identity);
        self.attach_identity(identity);
        self
    }

    /// Deliver [`SessionEvent`]s to `tx`
    pub fn with_events(mut self, tx: mpsc::Sender<SessionEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().view.state
    }

    pub fn identity(&self) -> Option<Address> {
        self.inner.read().identity
    }

    pub fn progress(&self) -> UserProgress {
        self.inner.read().progress
    }

    pub fn number_of_boxes(&self) -> u8 {
        self.ctx.catalog.number_of_boxes()
    }

    /// Whether a pipeline abandoned by [`BoxSession::reset`] is still running
    pub fn is_settling(&self) -> bool {
        self.inner.read().is_settling()
    }

    /// Current observable state
    pub fn snapshot(&self) -> SessionSnapshot {
        let max_opens = self.ctx.config.max_opens;
        let inner = self.inner.read();
        SessionSnapshot {
            identity: inner.identity,
            state: inner.view.state,
            selected_box: inner.view.selected_box,
            reward: inner.view.reward,
            transaction_ref: inner.view.transaction_ref,
            error_message: inner.view.error_message.clone(),
            failed_stage: inner.view.failed_stage,
            boxes_opened: inner.progress.boxes_opened,
            total_reward: inner.progress.total_reward,
            max_opens,
            opens_left: inner.progress.opens_left(max_opens),
            has_reached_limit: inner.progress.has_reached(max_opens),
            number_of_boxes: self.ctx.catalog.number_of_boxes(),
            settling: inner.is_settling(),
        }
    }

    /// Attach `identity`, loading its counters if it differs from the
    /// current one. The previous identity's counters are dropped.
    pub fn attach_identity(&self, identity: Address) {
        if self.inner.read().identity == Some(identity) {
            return;
        }

        let progress = self.ctx.store.load(&identity.key());
        {
            let mut inner = self.inner.write();
            inner.identity = Some(identity);
            inner.progress = progress;
        }
        tracing::debug!(
            %identity,
            boxes_opened = progress.boxes_opened,
            total_reward = progress.total_reward,
            "identity attached"
        );
        self.emit(SessionEvent::IdentityAttached { identity, progress });
    }

    /// Forget the identity and its in-memory counters
    pub fn detach_identity(&self) {
        let mut inner = self.inner.write();
        inner.identity = None;
        inner.progress = UserProgress::default();
    }

    /// Re-read the attached identity's counters from the store, picking up
    /// writes made by another process
    pub fn reload_progress(&self) -> SessionResult<UserProgress> {
        let identity = self.identity().ok_or(SessionError::NoIdentity)?;
        Ok(self.sync_progress(identity))
    }

    fn sync_progress(&self, identity: Address) -> UserProgress {
        let progress = self.ctx.store.load(&identity.key());
        let mut inner = self.inner.write();
        if inner.identity == Some(identity) {
            inner.progress = progress;
        }
        progress
    }

    /// Re-read `numberOfBoxes` from the chain
    pub async fn refresh_catalog(&self) -> ChainResult<u8> {
        let result = self.ctx.catalog.refresh(self.ctx.chain.as_ref()).await;
        if result.is_err() {
            self.ctx.metrics.catalog_refresh_failures_total.inc();
        }
        result
    }

    /// Return to `idle`, clearing the selection, reward, transaction and
    /// error. Counters are untouched. A pipeline still in flight keeps
    /// running but no longer updates this session's view.
    pub fn reset(&self) {
        let from = {
            let mut inner = self.inner.write();
            let from = inner.view.state;
            inner.generation += 1;
            inner.view = SessionView::default();
            from
        };
        tracing::debug!(%from, "session reset");
        if from != SessionState::Idle {
            self.emit(SessionEvent::Transition { from, to: SessionState::Idle });
        }
        self.emit(SessionEvent::Reset);
    }

    /// Open box `index` as `signer`.
    ///
    /// Returns `Err` only for usage errors: an out-of-range index, a
    /// pipeline already in flight for this session or identity, or a signer
    /// other than the one the session is bound to. Everything else,
    /// including the open limit, ends in the `revealed` or `error` state.
    pub async fn open_box(&self, index: u32, signer: Arc<dyn SigningIdentity>) -> SessionResult<()> {
        let _pipeline = self.pipeline.try_lock().map_err(|_| self.busy())?;

        let identity = signer.address();
        if let Some(bound) = self.bound {
            if bound != identity {
                return Err(SessionError::IdentityMismatch { session: bound, signer: identity });
            }
        }
        let _claim = self
            .ctx
            .in_flight
            .claim(identity)
            .ok_or(SessionError::IdentityBusy(identity))?;

        self.attach_identity(identity);
        // another session may have credited this identity since we loaded it
        let progress = self.sync_progress(identity);

        self.inner.write().view.error_message = None;

        let max_opens = self.ctx.config.max_opens;
        if progress.has_reached(max_opens) {
            self.reject_limit(identity);
            return Ok(());
        }

        let mut number_of_boxes = self.ctx.catalog.number_of_boxes();
        if number_of_boxes == 0 {
            // a failed refresh falls through to the range check with the stale value
            if let Ok(n) = self.refresh_catalog().await {
                number_of_boxes = n;
            }
        }

        if index >= u32::from(number_of_boxes) {
            self.ctx.metrics.invalid_selections_total.inc();
            tracing::debug!(%identity, box_index = index, number_of_boxes, "invalid box selection");
            return Err(SessionError::InvalidSelection { index, number_of_boxes });
        }

        let generation = self.start(index);
        tracing::info!(%identity, box_index = index, "opening box");

        match self.run_pipeline(generation, index, identity, signer.as_ref()).await {
            Ok(reward) => self.reveal(generation, identity, reward),
            Err(failure) => self.fail(generation, identity, failure),
        }
        self.inner.write().running = None;
        Ok(())
    }

    fn busy(&self) -> SessionError {
        let inner = self.inner.read();
        if inner.is_settling() {
            SessionError::Settling
        } else {
            SessionError::Busy(inner.view.state)
        }
    }

    fn reject_limit(&self, identity: Address) {
        let from = {
            let mut inner = self.inner.write();
            let from = inner.view.state;
            inner.generation += 1;
            inner.view = SessionView {
                state: SessionState::Error,
                error_message: Some(LIMIT_REACHED_MESSAGE.to_string()),
                ..SessionView::default()
            };
            from
        };
        self.ctx.metrics.limit_rejections_total.inc();
        tracing::warn!(%identity, max_opens = self.ctx.config.max_opens, "open limit reached");
        if from != SessionState::Error {
            self.emit(SessionEvent::Transition { from, to: SessionState::Error });
        }
        self.emit(SessionEvent::Failed {
            stage: None,
            message: LIMIT_REACHED_MESSAGE.to_string(),
        });
    }

    /// Enter `encrypting` with a fresh view; returns the new generation
    fn start(&self, index: u32) -> u64 {
        let (from, generation) = {
            let mut inner = self.inner.write();
            let from = inner.view.state;
            inner.generation += 1;
            inner.running = Some(inner.generation);
            inner.view = SessionView {
                state: SessionState::Encrypting,
                selected_box: Some(index),
                ..SessionView::default()
            };
            (from, inner.generation)
        };
        self.ctx.metrics.opens_started_total.inc();
        self.emit(SessionEvent::Transition { from, to: SessionState::Encrypting });
        generation
    }

    async fn run_pipeline(
        &self,
        generation: u64,
        index: u32,
        identity: Address,
        signer: &dyn SigningIdentity,
    ) -> Result<u64, StageFailure> {
        let contract = self.ctx.config.contract;
        let metrics = &self.ctx.metrics;

        // encrypting
        let timer = Timer::new(&metrics.encrypt_latency);
        let gateway = self
            .ctx
            .gateway
            .get()
            .await
            .map_err(|e| StageFailure::new(SessionState::Encrypting, e))?;
        let choice = (index & 0xff) as u8;
        let input = gateway
            .encrypt_u8(choice, &contract, &identity)
            .await
            .map_err(|e| StageFailure::new(SessionState::Encrypting, e))?;
        timer.observe_duration();

        // sending
        self.advance(generation, SessionState::Sending);
        let timer = Timer::new(&metrics.send_latency);
        let handle: Handle = self
            .ctx
            .chain
            .predict_open_box(&identity, &input)
            .await
            .map_err(|e| StageFailure::new(SessionState::Sending, e))?;
        let tx = self
            .ctx
            .chain
            .submit_open_box(&identity, &input)
            .await
            .map_err(|e| StageFailure::new(SessionState::Sending, e))?;
        timer.observe_duration();
        self.record_transaction(generation, tx);

        // confirming
        self.advance(generation, SessionState::Confirming);
        let timer = Timer::new(&metrics.confirm_latency);
        self.ctx
            .chain
            .await_confirmation(&tx)
            .await
            .map_err(|e| StageFailure::new(SessionState::Confirming, e))?;
        timer.observe_duration();

        // decrypting
        self.advance(generation, SessionState::Decrypting);
        let timer = Timer::new(&metrics.decrypt_latency);
        let reward = gateway
            .decrypt(&handle, &contract, signer)
            .await
            .map_err(|e| StageFailure::new(SessionState::Decrypting, e))?;
        timer.observe_duration();

        Ok(reward)
    }

    /// Move to the next stage if this pipeline still owns the view
    fn advance(&self, generation: u64, to: SessionState) {
        let from = {
            let mut inner = self.inner.write();
            if inner.generation != generation {
                return;
            }
            let from = inner.view.state;
            inner.view.state = to;
            from
        };
        tracing::debug!(%from, %to, "session stage");
        self.emit(SessionEvent::Transition { from, to });
    }

    fn record_transaction(&self, generation: u64, tx: TxHash) {
        {
            let mut inner = self.inner.write();
            if inner.generation != generation {
                return;
            }
            inner.view.transaction_ref = Some(tx);
        }
        tracing::debug!(%tx, "transaction submitted");
        self.emit(SessionEvent::TransactionSent { tx });
    }

    /// Credit `reward` to `identity`, persist, then enter `revealed`.
    ///
    /// The identity that signed is credited even if another one was
    /// attached mid-flight.
    fn reveal(&self, generation: u64, identity: Address, reward: u64) {
        let max_opens = self.ctx.config.max_opens;
        let progress = self
            .ctx
            .store
            .update(&identity.key(), |p| p.record(reward, max_opens));
        self.ctx.metrics.record_revealed(reward);

        let from = {
            let mut inner = self.inner.write();
            if inner.identity == Some(identity) {
                inner.progress = progress;
            }
            if inner.generation != generation {
                None
            } else {
                let from = inner.view.state;
                inner.view.reward = Some(reward);
                inner.view.state = SessionState::Revealed;
                Some(from)
            }
        };

        tracing::info!(
            %identity,
            reward,
            boxes_opened = progress.boxes_opened,
            total_reward = progress.total_reward,
            "box revealed"
        );
        if let Some(from) = from {
            self.emit(SessionEvent::Transition { from, to: SessionState::Revealed });
            self.emit(SessionEvent::Revealed { reward, progress });
        }
    }

    fn fail(&self, generation: u64, identity: Address, failure: StageFailure) {
        self.ctx.metrics.opens_failed_total.inc();
        tracing::error!(%identity, stage = %failure.stage, error = %failure.message, "box opening failed");

        let from = {
            let mut inner = self.inner.write();
            if inner.generation != generation {
                return;
            }
            let from = inner.view.state;
            inner.view.state = SessionState::Error;
            inner.view.error_message = Some(failure.message.clone());
            inner.view.failed_stage = Some(failure.stage);
            from
        };
        self.emit(SessionEvent::Transition { from, to: SessionState::Error });
        self.emit(SessionEvent::Failed {
            stage: Some(failure.stage),
            message: failure.message,
        });
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.event_tx {
            if let Err(e) = tx.try_send(event) {
                tracing::warn!(error = %e, "dropping session event");
            }
        }
    }
}
