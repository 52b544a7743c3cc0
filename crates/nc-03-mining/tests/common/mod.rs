//! Shared fixtures for the coordinator integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use nc_01_mempool::{MempoolError, MockTimeSource, NullifierLedger, TransactionPool};
use nc_03_mining::{
    AddBlockResult, Chain, ChainError, ChainSnapshot, InMemoryChain, MiningConfig,
    MiningCoordinator, VerifyResult,
};
use parking_lot::Mutex;
use shared_bus::{BlockchainEvent, EventFilter, EventTopic, InMemoryEventBus, Subscription};
use shared_types::{
    Block, BlockHeader, Hash, MinerAccount, NoteCommitment, Nullifier, SpendDescriptor, Target,
    Transaction, U256,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

pub const GENESIS_MS: u64 = 1_700_000_000_000;
pub const MIN_DIFFICULTY: u64 = 131_072;
pub const BLOCK_REWARD: u64 = 2_000_000_000;

pub fn account() -> MinerAccount {
    MinerAccount::new([0x11; 32], [0x22; 32])
}

/// Transfer spending one nullifier per byte of `nullifiers` and creating one
/// note per spend.
pub fn transfer(nullifiers: &[u8], fee: u64) -> Transaction {
    Transaction::new(
        nullifiers
            .iter()
            .map(|n| SpendDescriptor {
                nullifier: Nullifier([*n; 32]),
                commitment: [0; 32],
            })
            .collect(),
        nullifiers
            .iter()
            .map(|_| NoteCommitment(rand::random()))
            .collect(),
        fee,
        vec![],
    )
}

/// Config with an account and the given floor.
pub fn config(min_difficulty: u64) -> MiningConfig {
    MiningConfig {
        miner_account: Some(account()),
        min_difficulty,
        ..MiningConfig::default()
    }
}

pub struct Harness<C: Chain + 'static> {
    pub bus: Arc<InMemoryEventBus>,
    pub chain: Arc<C>,
    pub pool: Arc<TransactionPool>,
    pub time: Arc<MockTimeSource>,
    pub coordinator: MiningCoordinator,
    /// Mining-topic events, subscribed before anything was published
    pub mining: Subscription,
}

/// Wire a coordinator onto `chain`, sharing `bus`.
pub fn build<C: Chain + 'static>(
    bus: Arc<InMemoryEventBus>,
    chain: Arc<C>,
    config: MiningConfig,
    now_ms: u64,
) -> Harness<C> {
    let time = Arc::new(MockTimeSource::new(now_ms));
    let pool = Arc::new(TransactionPool::with_time_source(
        config.mempool.clone(),
        chain.clone(),
        time.clone(),
    ));
    let mining = bus.subscribe(EventFilter::topics(vec![EventTopic::Mining]));
    let coordinator =
        MiningCoordinator::new(config, chain.clone(), pool.clone(), bus.clone(), time.clone());
    Harness {
        bus,
        chain,
        pool,
        time,
        coordinator,
        mining,
    }
}

/// Chain whose genesis sits at `genesis_difficulty`. PoW is not checked.
pub fn memory_chain(genesis_difficulty: u64) -> (Arc<InMemoryEventBus>, Arc<InMemoryChain>) {
    let bus = Arc::new(InMemoryEventBus::new());
    let target = Target::from_difficulty(U256::from(genesis_difficulty));
    let chain =
        Arc::new(InMemoryChain::genesis(bus.clone(), target, GENESIS_MS).without_pow_check());
    (bus, chain)
}

pub fn harness(config: MiningConfig, offset_ms: u64) -> Harness<InMemoryChain> {
    let genesis = config.min_difficulty;
    let (bus, chain) = memory_chain(genesis);
    build(bus, chain, config, GENESIS_MS + offset_ms)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready {
    pub id: u64,
    pub sequence: u64,
    pub target: Target,
}

/// Next `CandidateReady`, skipping other mining events.
pub async fn next_candidate(sub: &mut Subscription, within: Duration) -> Option<Ready> {
    timeout(within, async {
        loop {
            match sub.recv().await {
                Some(BlockchainEvent::CandidateReady {
                    candidate_id,
                    sequence,
                    target,
                    ..
                }) => {
                    return Some(Ready {
                        id: candidate_id,
                        sequence,
                        target,
                    })
                }
                Some(_) => continue,
                None => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Drain everything queued and return the blocks announced as mined.
pub fn drain_mined(sub: &mut Subscription) -> Vec<Block> {
    let mut mined = Vec::new();
    while let Ok(Some(event)) = sub.try_recv() {
        if let BlockchainEvent::NewBlockMined(block) = event {
            mined.push(block);
        }
    }
    mined
}

/// Delegating chain whose behaviour can be bent per test.
pub struct ScriptedChain {
    pub inner: Arc<InMemoryChain>,
    /// Add a bogus leaf to the nullifier tree of every snapshot
    pub tamper_snapshot: AtomicBool,
    /// Report this nullifier as already confirmed
    pub poisoned: Mutex<Option<Nullifier>>,
    /// Refuse every `add_block`
    pub refuse_add: AtomicBool,
    /// Fail this many upcoming snapshots with `Unavailable`
    pub failing_snapshots: AtomicUsize,
    /// Number of `add_block` calls that reached this chain
    pub add_block_calls: AtomicUsize,
}

impl ScriptedChain {
    pub fn new(inner: Arc<InMemoryChain>) -> Self {
        Self {
            inner,
            tamper_snapshot: AtomicBool::new(false),
            poisoned: Mutex::new(None),
            refuse_add: AtomicBool::new(false),
            failing_snapshots: AtomicUsize::new(0),
            add_block_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl NullifierLedger for ScriptedChain {
    async fn nullifier_history_size(&self, at_sequence: u64) -> Result<u64, MempoolError> {
        self.inner.nullifier_history_size(at_sequence).await
    }

    async fn nullifier_at(&self, position: u64) -> Result<Option<Nullifier>, MempoolError> {
        self.inner.nullifier_at(position).await
    }

    async fn contains_nullifier(
        &self,
        nullifier: &Nullifier,
        up_to_size: u64,
    ) -> Result<bool, MempoolError> {
        let poisoned = *self.poisoned.lock();
        if poisoned == Some(*nullifier) {
            return Ok(true);
        }
        self.inner.contains_nullifier(nullifier, up_to_size).await
    }
}

#[async_trait]
impl Chain for ScriptedChain {
    async fn head_hash(&self) -> Result<Hash, ChainError> {
        self.inner.head_hash().await
    }

    async fn head_header(&self) -> Result<BlockHeader, ChainError> {
        self.inner.head_header().await
    }

    async fn snapshot(&self) -> Result<ChainSnapshot, ChainError> {
        let failing = self
            .failing_snapshots
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(ChainError::Unavailable("snapshot timed out".into()));
        }
        let mut snapshot = self.inner.snapshot().await?;
        if self.tamper_snapshot.load(Ordering::SeqCst) {
            snapshot
                .nullifiers
                .append([0xEE; 32])
                .map_err(|e| ChainError::Storage(e.to_string()))?;
        }
        Ok(snapshot)
    }

    async fn verify_block_add(&self, block: &Block) -> Result<VerifyResult, ChainError> {
        self.inner.verify_block_add(block).await
    }

    async fn add_block(&self, block: Block) -> Result<AddBlockResult, ChainError> {
        self.add_block_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_add.load(Ordering::SeqCst) {
            return Ok(AddBlockResult::not_added("lost fork choice"));
        }
        self.inner.add_block(block).await
    }
}
