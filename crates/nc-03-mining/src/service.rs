//! Mining coordinator
//!
//! One owner task per mining session serialises everything that builds
//! candidates: head changes from the bus, retarget timer fires and shutdown.
//! Solution reports run on the caller's task and only read the candidate
//! table, so they never block construction.

use crate::{
    config::MiningConfig,
    domain::{
        CandidateBlock, DifficultyController, DifficultyState, HomesteadCurve, MiningOutcome,
        MiningState, MiningStatus, RecentCandidates, RejectionReason, RetargetCurve,
    },
    error::{MiningError, Result},
    metrics::Metrics,
    ports::{Chain, MiningService},
};
use async_trait::async_trait;
use nc_01_mempool::{SeenNullifiers, TimeSource, TransactionPool};
use nc_02_commitments::CommitmentBuilder;
use nc_telemetry::{HistogramTimer, CANDIDATE_BUILD_DURATION};
use parking_lot::{Mutex, RwLock};
use shared_bus::{
    BlockchainEvent, EventFilter, EventPublisher, EventTopic, InMemoryEventBus, Subscription,
};
use shared_types::{short_hex, BlockHeader, Hash, MinerAccount, Transaction};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

/// Mutable coordinator fields read by `status`
#[derive(Debug, Default)]
struct CoordinatorState {
    state: MiningState,
    /// Latest head seen, built on or not
    head: Option<Hash>,
    head_sequence: Option<u64>,
    /// Head the active candidate was built on
    built_on: Option<Hash>,
    active_candidate: Option<u64>,
    difficulty: Option<DifficultyState>,
    session_id: Option<String>,
    /// Reward recipient resolved at start
    account: Option<MinerAccount>,
}

/// Everything shared between the public handle and the owner task
struct CoordinatorInner {
    config: MiningConfig,
    chain: Arc<dyn Chain>,
    pool: Arc<TransactionPool>,
    bus: Arc<InMemoryEventBus>,
    time: Arc<dyn TimeSource>,
    difficulty: DifficultyController,
    graffiti: [u8; 32],
    candidates: Mutex<RecentCandidates>,
    state: RwLock<CoordinatorState>,
    /// Next candidate id. Never reset, so ids are unique per coordinator.
    next_candidate_id: AtomicU64,
    metrics: Metrics,
    /// Submissions hold the read side; shutdown takes the write side.
    running: tokio::sync::RwLock<bool>,
}

/// A live mining session
struct Session {
    cancel: CancellationToken,
    owner: JoinHandle<()>,
}

/// Coordinates candidate construction and solution reconciliation
///
/// ## Lifecycle
///
/// `Stopped → Starting → Mining → Stopped`. `start` and `shutdown` may be
/// called repeatedly; each `start` opens a new session with its own id.
pub struct MiningCoordinator {
    inner: Arc<CoordinatorInner>,
    session: tokio::sync::Mutex<Option<Session>>,
}

impl MiningCoordinator {
    /// Create a coordinator using the default retarget curve
    pub fn new(
        config: MiningConfig,
        chain: Arc<dyn Chain>,
        pool: Arc<TransactionPool>,
        bus: Arc<InMemoryEventBus>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let curve = Arc::new(HomesteadCurve::new(config.difficulty_bucket_secs));
        Self::with_curve(config, chain, pool, bus, time, curve)
    }

    /// Create a coordinator with a custom retarget curve
    pub fn with_curve(
        config: MiningConfig,
        chain: Arc<dyn Chain>,
        pool: Arc<TransactionPool>,
        bus: Arc<InMemoryEventBus>,
        time: Arc<dyn TimeSource>,
        curve: Arc<dyn RetargetCurve>,
    ) -> Self {
        let difficulty =
            DifficultyController::new(config.min_difficulty(), config.retarget_interval(), curve);
        let graffiti = config.graffiti_bytes();
        let candidates = RecentCandidates::new(config.recent_candidates_capacity);

        debug!(
            min_difficulty = %difficulty.min_difficulty(),
            retarget_interval = ?difficulty.retarget_interval(),
            recent_candidates = candidates.capacity(),
            "Mining coordinator created"
        );

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                chain,
                pool,
                bus,
                time,
                difficulty,
                graffiti,
                candidates: Mutex::new(candidates),
                state: RwLock::new(CoordinatorState::default()),
                next_candidate_id: AtomicU64::new(1),
                metrics: Metrics::new(),
                running: tokio::sync::RwLock::new(false),
            }),
            session: tokio::sync::Mutex::new(None),
        }
    }

    /// A candidate still held in the recent table
    pub fn candidate(&self, id: u64) -> Option<Arc<CandidateBlock>> {
        self.inner.candidates.lock().get(id)
    }

    /// Number of candidates currently held
    pub fn recent_candidates(&self) -> usize {
        self.inner.candidates.lock().len()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn difficulty(&self) -> &DifficultyController {
        &self.inner.difficulty
    }

    fn resolve_account(&self) -> Result<MinerAccount> {
        match (&self.inner.config.miner_account, self.inner.config.force_mining) {
            (Some(account), _) => Ok(account.clone()),
            (None, true) => {
                warn!("No miner account configured; forced mining pays rewards to the burn account");
                Ok(MinerAccount::burn())
            }
            (None, false) => Err(MiningError::MissingMinerAccount),
        }
    }
}

#[async_trait]
impl MiningService for MiningCoordinator {
    async fn start(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Err(MiningError::AlreadyRunning);
        }

        self.inner.config.validate()?;
        let account = self.resolve_account()?;
        self.inner.state.write().state = MiningState::Starting;

        // Subscribe before reading the head so no change is missed
        let subscription = self
            .inner
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::Chain]));

        let head = match self.inner.chain.head_header().await {
            Ok(header) => header,
            Err(err) => {
                self.inner.state.write().state = MiningState::Stopped;
                return Err(MiningError::ChainUnavailable(err.to_string()));
            }
        };

        let session_id = Uuid::new_v4().to_string();
        {
            let mut state = self.inner.state.write();
            state.account = Some(account);
            state.session_id = Some(session_id.clone());
            state.head = Some(head.hash());
            state.head_sequence = Some(head.sequence);
        }
        *self.inner.running.write().await = true;

        let cancel = CancellationToken::new();
        let (retarget_tx, retarget_rx) = mpsc::channel(4);
        let owner = SessionOwner {
            inner: self.inner.clone(),
            subscription,
            cancel: cancel.clone(),
            retarget_tx,
            retarget_rx,
            retarget: None,
            generation: 0,
        };
        let span = info_span!("mining_session", session = %session_id);
        let handle = tokio::spawn(owner.run().instrument(span));

        *session = Some(Session {
            cancel,
            owner: handle,
        });
        self.inner.state.write().state = MiningState::Mining;

        info!(
            "[nc-03] Mining started on head {} (sequence {}, session {})",
            short_hex(&head.hash()),
            head.sequence,
            session_id
        );
        Ok(())
    }

    async fn shutdown(&self) {
        let mut session = self.session.lock().await;
        let mut running = self.inner.running.write().await;
        let was_running = std::mem::replace(&mut *running, false);

        if let Some(active) = session.take() {
            active.cancel.cancel();
            if let Err(err) = active.owner.await {
                if err.is_panic() {
                    error!("Mining session task panicked: {}", err);
                }
            }
        }

        self.inner.candidates.lock().clear();
        {
            let mut state = self.inner.state.write();
            state.state = MiningState::Stopped;
            state.head = None;
            state.head_sequence = None;
            state.built_on = None;
            state.active_candidate = None;
            state.difficulty = None;
            state.session_id = None;
        }
        drop(running);

        if was_running {
            info!("[nc-03] Mining stopped");
        }
    }

    async fn successfully_mined(&self, randomness: u64, candidate_id: u64) -> MiningOutcome {
        let running = self.inner.running.read().await;
        let outcome = if *running {
            self.inner.reconcile(randomness, candidate_id).await
        } else {
            MiningOutcome::NotRunning
        };
        drop(running);

        if let Some(reason) = outcome.discard_label() {
            self.inner.metrics.record_discarded(reason);
            debug!(candidate_id, reason, "Solution discarded");
        }
        outcome
    }

    async fn status(&self) -> MiningStatus {
        let state = self.inner.state.read();
        MiningStatus {
            state: state.state,
            head: state.head,
            active_candidate: state.active_candidate,
            candidates_built: self.inner.metrics.get_candidates_built(),
            blocks_mined: self.inner.metrics.get_blocks_mined(),
            difficulty: state.difficulty.map(|d| d.difficulty),
            session_id: state.session_id.clone(),
        }
    }
}

impl Drop for MiningCoordinator {
    fn drop(&mut self) {
        if let Ok(mut session) = self.session.try_lock() {
            if let Some(active) = session.take() {
                active.cancel.cancel();
            }
        }
    }
}

impl CoordinatorInner {
    /// Build a candidate on the current tip and hand it to miners.
    ///
    /// Returns `None` when the session was cancelled mid-build.
    async fn construct_and_mine_block(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<CandidateBlock>>> {
        let _timer = HistogramTimer::new(&CANDIDATE_BUILD_DURATION);

        let snapshot = self.chain.snapshot().await?;
        let parent = snapshot.header.clone();
        let head = snapshot.head_hash();
        let sequence = parent.sequence + 1;

        let selection = self
            .pool
            .select_for_block(snapshot.nullifier_size(), &self.config.block_limits())
            .await?;

        let mut transactions = Vec::with_capacity(selection.transactions.len() + 1);
        if self.config.include_miners_fee {
            let account = self
                .state
                .read()
                .account
                .clone()
                .unwrap_or_else(MinerAccount::burn);
            let amount = self.config.block_reward.saturating_add(selection.total_fees);
            transactions.push(Arc::new(Transaction::miners_fee(&account, sequence, amount)));
        }
        transactions.extend(selection.transactions.iter().cloned());

        let mut builder = CommitmentBuilder::new(snapshot.notes, snapshot.nullifiers);
        for tx in &transactions {
            builder.add_transaction(tx)?;
        }
        let roots = builder.finish();

        let timestamp_ms = self.time.now_ms().max(parent.timestamp_ms + 1);
        let difficulty = self.difficulty.state_for(&parent, timestamp_ms);

        let header = BlockHeader {
            sequence,
            previous_block_hash: head,
            note_commitment: roots.note_commitment,
            nullifier_commitment: roots.nullifier_commitment,
            target: difficulty.target,
            randomness: 0,
            timestamp_ms,
            graffiti: self.graffiti,
        };

        if cancel.is_cancelled() {
            debug!(sequence, "Session cancelled, candidate dropped");
            return Ok(None);
        }

        let id = self.next_candidate_id.fetch_add(1, Ordering::SeqCst);
        let candidate = Arc::new(CandidateBlock {
            id,
            header,
            transactions,
            difficulty: difficulty.difficulty,
            created_at_ms: self.time.now_ms(),
        });

        let built_on = self.state.read().built_on;
        {
            let mut candidates = self.candidates.lock();
            if built_on != Some(head) {
                let dropped = candidates.retain_parent(&head);
                if dropped > 0 {
                    debug!(dropped, "Dropped candidates for superseded head");
                }
            }
            if let Some(evicted) = candidates.insert(candidate.clone()) {
                trace!(evicted = evicted.id, "Recent candidates full, oldest evicted");
            }
        }
        {
            let mut state = self.state.write();
            state.head = Some(head);
            state.head_sequence = Some(parent.sequence);
            state.built_on = Some(head);
            state.active_candidate = Some(id);
            state.difficulty = Some(difficulty);
        }

        self.bus
            .publish(BlockchainEvent::CandidateReady {
                candidate_id: id,
                header_bytes: candidate.header.to_bytes(),
                target: difficulty.target,
                sequence,
            })
            .await;
        self.metrics
            .record_candidate(selection.transactions.len(), sequence);

        info!(
            candidate_id = id,
            sequence,
            head = %short_hex(&head),
            transactions = selection.transactions.len(),
            spends = selection.spend_count(),
            rejected = selection.rejected,
            difficulty = %difficulty.difficulty,
            "Candidate ready"
        );
        Ok(Some(candidate))
    }

    /// Match a solution to its candidate and submit the block.
    async fn reconcile(&self, randomness: u64, candidate_id: u64) -> MiningOutcome {
        let candidate = self.candidates.lock().get(candidate_id);
        let Some(candidate) = candidate else {
            return MiningOutcome::UnknownCandidate;
        };

        let head = match self.chain.head_hash().await {
            Ok(head) => head,
            Err(err) => return rejected(RejectionReason::Chain(err.to_string())),
        };
        if head != candidate.parent_hash() {
            debug!(
                candidate_id,
                parent = %short_hex(&candidate.parent_hash()),
                head = %short_hex(&head),
                "Solution built on a superseded head"
            );
            return MiningOutcome::Stale;
        }

        // A block may have confirmed one of our spends since construction
        let ledger_size = match self
            .chain
            .nullifier_history_size(candidate.sequence() - 1)
            .await
        {
            Ok(size) => size,
            Err(err) => return rejected(RejectionReason::Chain(err.to_string())),
        };
        let mut seen = SeenNullifiers::new();
        for tx in candidate.pool_transactions() {
            match self.pool.is_valid_transaction(tx, ledger_size, &mut seen).await {
                Ok(true) => {}
                Ok(false) => {
                    self.candidates.lock().remove(candidate_id);
                    return rejected(RejectionReason::InvalidTransaction(tx.id()));
                }
                Err(err) => return rejected(RejectionReason::Chain(err.to_string())),
            }
        }

        let block = candidate.to_block(randomness);
        match self.chain.verify_block_add(&block).await {
            Ok(verdict) if verdict.valid => {}
            Ok(verdict) => {
                self.candidates.lock().remove(candidate_id);
                return rejected(RejectionReason::VerificationFailed(
                    verdict.reason.unwrap_or_default(),
                ));
            }
            Err(err) => return rejected(RejectionReason::Chain(err.to_string())),
        }

        let hash = block.hash();
        let sequence = block.header.sequence;
        let transaction_ids = block.transaction_ids();
        match self.chain.add_block(block.clone()).await {
            Ok(result) if result.is_added => {}
            Ok(result) => {
                self.candidates.lock().remove(candidate_id);
                return rejected(RejectionReason::NotAdded(result.reason.unwrap_or_default()));
            }
            Err(err) => return rejected(RejectionReason::Chain(err.to_string())),
        }

        self.candidates.lock().remove(candidate_id);
        let removed = self.pool.remove_confirmed(&transaction_ids);
        self.bus.publish(BlockchainEvent::NewBlockMined(block)).await;
        self.metrics.record_block_mined(sequence);

        info!(
            "[nc-03] Mined block {} at sequence {} ({} pool transactions confirmed)",
            short_hex(&hash),
            sequence,
            removed
        );
        MiningOutcome::Accepted { hash, sequence }
    }
}

fn rejected(reason: RejectionReason) -> MiningOutcome {
    MiningOutcome::Rejected { reason }
}

/// Retarget request for the candidate generation that scheduled it
#[derive(Debug, Clone, Copy)]
struct RetargetFire {
    head: Hash,
    generation: u64,
    /// Rebuild after a failed construction rather than a difficulty refresh
    retry: bool,
}

/// What woke the owner task
enum Wake {
    Shutdown,
    Event(Option<BlockchainEvent>),
    Retarget(RetargetFire),
}

/// Single owner of candidate construction for one session
struct SessionOwner {
    inner: Arc<CoordinatorInner>,
    subscription: Subscription,
    cancel: CancellationToken,
    retarget_tx: mpsc::Sender<RetargetFire>,
    retarget_rx: mpsc::Receiver<RetargetFire>,
    /// Cancels the pending retarget timer, if any
    retarget: Option<CancellationToken>,
    /// Bumped per scheduled timer; older fires are ignored
    generation: u64,
}

impl SessionOwner {
    async fn run(mut self) {
        self.construct().await;

        loop {
            let wake = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Wake::Shutdown,
                event = self.subscription.recv() => Wake::Event(event),
                Some(fire) = self.retarget_rx.recv() => Wake::Retarget(fire),
            };

            match wake {
                Wake::Shutdown => break,
                Wake::Event(Some(BlockchainEvent::ChainHeadChanged { header, .. })) => {
                    self.on_chain_head_change(header).await;
                }
                Wake::Event(Some(_)) => {}
                Wake::Event(None) => {
                    warn!("Event bus closed, mining session ending");
                    break;
                }
                Wake::Retarget(fire) => self.on_retarget(fire).await,
            }
        }

        self.cancel_retarget();
        debug!("Mining session ended");
    }

    async fn on_chain_head_change(&mut self, header: BlockHeader) {
        let hash = header.hash();
        {
            let state = self.inner.state.read();
            if state.built_on == Some(hash) {
                trace!(sequence = header.sequence, "Head change for the head already mined");
                return;
            }
            if state.head_sequence.is_some_and(|seen| header.sequence < seen) {
                trace!(sequence = header.sequence, "Head change older than the head already seen");
                return;
            }
        }

        self.cancel_retarget();
        let dropped = self.inner.candidates.lock().retain_parent(&hash);
        {
            let mut state = self.inner.state.write();
            state.head = Some(hash);
            state.head_sequence = Some(header.sequence);
            state.active_candidate = None;
        }
        debug!(
            sequence = header.sequence,
            head = %short_hex(&hash),
            dropped,
            "Chain head changed"
        );
        self.construct().await;
    }

    async fn on_retarget(&mut self, fire: RetargetFire) {
        let live = self
            .retarget
            .as_ref()
            .is_some_and(|token| !token.is_cancelled());
        if fire.generation != self.generation || !live {
            trace!(generation = fire.generation, "Ignoring superseded retarget");
            return;
        }
        self.retarget = None;

        match self.inner.chain.head_hash().await {
            Ok(head) if head == fire.head => {}
            Ok(_) => {
                debug!("Head moved before retarget fired");
                return;
            }
            Err(err) => {
                warn!(%err, "Could not read head for retarget");
                self.schedule_retarget(fire.head, true);
                return;
            }
        }

        if fire.retry {
            debug!(head = %short_hex(&fire.head), "Retrying candidate construction");
        } else {
            debug!(head = %short_hex(&fire.head), "Retargeting candidate");
            self.inner.metrics.record_retarget();
        }
        self.construct().await;
    }

    async fn construct(&mut self) {
        match self.inner.construct_and_mine_block(&self.cancel).await {
            Ok(Some(candidate)) => {
                if self
                    .inner
                    .difficulty
                    .should_schedule_retarget(candidate.difficulty)
                {
                    self.schedule_retarget(candidate.parent_hash(), false);
                }
            }
            Ok(None) => {}
            Err(err) => {
                let recoverable = err.is_recoverable();
                warn!(%err, recoverable, "Candidate construction failed");
                let head = self.inner.state.read().head;
                if let (true, Some(head)) = (recoverable, head) {
                    self.schedule_retarget(head, true);
                }
            }
        }
    }

    /// Arm the timer: a difficulty refresh, or a `retry` after a failed build.
    fn schedule_retarget(&mut self, head: Hash, retry: bool) {
        self.cancel_retarget();
        self.generation += 1;

        let token = self.cancel.child_token();
        let timer = token.clone();
        let sender = self.retarget_tx.clone();
        let fire = RetargetFire {
            head,
            generation: self.generation,
            retry,
        };
        let interval = self.inner.difficulty.retarget_interval();

        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(interval) => {
                    let _ = sender.send(fire).await;
                }
            }
        });

        trace!(generation = self.generation, retry, ?interval, "Retarget scheduled");
        self.retarget = Some(token);
    }

    fn cancel_retarget(&mut self) {
        if let Some(token) = self.retarget.take() {
            token.cancel();
        }
    }
}
