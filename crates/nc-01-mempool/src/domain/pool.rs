//! # Transaction Pool - Insertion-Ordered Admission and Selection
//!
//! ## Data Structures
//!
//! - `by_id`: O(1) lookup by transaction id
//! - `order`: admission sequence number to id (BTreeMap), giving a stable
//!   iteration order and O(log n) eviction of the oldest entry
//!
//! Readers never hold the lock across an await: `ordered_transactions`
//! copies `Arc`s out and selection works on that snapshot.

use parking_lot::RwLock;
use shared_bus::{BlockchainEvent, EventPublisher};
use shared_types::{Transaction, TransactionId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, trace};

use super::config::MempoolConfig;
use super::errors::MempoolError;
use super::selection::{BlockLimits, SeenNullifiers, Selection};
use crate::ports::{NullifierLedger, SystemTimeSource, TimeSource};

/// A pooled transaction with admission metadata.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub transaction: Arc<Transaction>,
    pub id: TransactionId,
    /// Admission time in milliseconds.
    pub received_at: u64,
    sequence: u64,
}

#[derive(Debug, Default)]
struct PoolInner {
    by_id: HashMap<TransactionId, PoolEntry>,
    order: BTreeMap<u64, TransactionId>,
    next_sequence: u64,
}

impl PoolInner {
    fn remove(&mut self, id: &TransactionId) -> Option<PoolEntry> {
        let entry = self.by_id.remove(id)?;
        self.order.remove(&entry.sequence);
        Some(entry)
    }

    fn evict_oldest(&mut self) -> Option<PoolEntry> {
        let (_, id) = self.order.pop_first()?;
        self.by_id.remove(&id)
    }
}

/// Unconfirmed transactions awaiting inclusion.
pub struct TransactionPool {
    config: MempoolConfig,
    ledger: Arc<dyn NullifierLedger>,
    time: Arc<dyn TimeSource>,
    inner: RwLock<PoolInner>,
}

impl TransactionPool {
    /// Creates an empty pool reading nullifier history from `ledger`.
    pub fn new(config: MempoolConfig, ledger: Arc<dyn NullifierLedger>) -> Self {
        Self::with_time_source(config, ledger, Arc::new(SystemTimeSource))
    }

    pub fn with_time_source(
        config: MempoolConfig,
        ledger: Arc<dyn NullifierLedger>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            ledger,
            time,
            inner: RwLock::new(PoolInner::default()),
        }
    }

    pub fn config(&self) -> &MempoolConfig {
        &self.config
    }

    /// Admit a transaction, returning `true` if it was newly added.
    pub fn accept_transaction(&self, tx: Transaction) -> bool {
        match self.try_accept(tx) {
            Ok(_) => true,
            Err(e) => {
                trace!(error = %e, "Transaction not admitted");
                false
            }
        }
    }

    /// Admit a transaction with a reason on refusal.
    ///
    /// Only structural checks run here. Spend conflicts are resolved at
    /// selection time against the ledger height being built on.
    pub fn try_accept(&self, tx: Transaction) -> Result<TransactionId, MempoolError> {
        let id = tx.id();
        if tx.is_miners_fee() {
            return Err(MempoolError::MinersFee(id));
        }
        if tx.spends.is_empty() {
            return Err(MempoolError::NoSpends(id));
        }

        let received_at = self.time.now_ms();
        let mut inner = self.inner.write();
        if inner.by_id.contains_key(&id) {
            return Err(MempoolError::DuplicateTransaction(id));
        }

        while inner.by_id.len() >= self.config.max_transactions.max(1) {
            if let Some(evicted) = inner.evict_oldest() {
                debug!(tx = %evicted.id, "Pool full, evicted oldest transaction");
            }
        }

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.order.insert(sequence, id);
        inner.by_id.insert(
            id,
            PoolEntry {
                transaction: Arc::new(tx),
                id,
                received_at,
                sequence,
            },
        );
        nc_telemetry::MEMPOOL_TRANSACTIONS.set(inner.by_id.len() as i64);

        debug!(tx = %id, pool_size = inner.by_id.len(), "Transaction admitted");
        Ok(id)
    }

    /// Admit `tx` and announce it with `TransactionAccepted`.
    ///
    /// Nothing is published when admission fails.
    pub async fn submit(
        &self,
        tx: Transaction,
        bus: &dyn EventPublisher,
    ) -> Result<TransactionId, MempoolError> {
        let id = self.try_accept(tx)?;
        bus.publish(BlockchainEvent::TransactionAccepted(id)).await;
        Ok(id)
    }

    pub fn size(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.inner.read().by_id.contains_key(id)
    }

    pub fn get(&self, id: &TransactionId) -> Option<Arc<Transaction>> {
        self.inner
            .read()
            .by_id
            .get(id)
            .map(|entry| Arc::clone(&entry.transaction))
    }

    pub fn entry(&self, id: &TransactionId) -> Option<PoolEntry> {
        self.inner.read().by_id.get(id).cloned()
    }

    /// Snapshot of all transactions in admission order.
    pub fn ordered_transactions(&self) -> Vec<Arc<Transaction>> {
        let inner = self.inner.read();
        inner
            .order
            .values()
            .filter_map(|id| inner.by_id.get(id))
            .map(|entry| Arc::clone(&entry.transaction))
            .collect()
    }

    /// Check `tx` against the first `ledger_size` confirmed nullifiers and
    /// the nullifiers already claimed in this pass.
    ///
    /// On success every nullifier of `tx` is appended to `seen` in spend
    /// order. On rejection `seen` is left untouched.
    pub async fn is_valid_transaction(
        &self,
        tx: &Transaction,
        ledger_size: u64,
        seen: &mut SeenNullifiers,
    ) -> Result<bool, MempoolError> {
        let mut claimed = Vec::with_capacity(tx.spends.len());
        for nullifier in tx.nullifiers() {
            if seen.contains(nullifier) || claimed.contains(nullifier) {
                trace!(%nullifier, "Nullifier already claimed in this block");
                return Ok(false);
            }
            if self
                .ledger
                .contains_nullifier(nullifier, ledger_size)
                .await?
            {
                trace!(%nullifier, ledger_size, "Nullifier already spent on chain");
                return Ok(false);
            }
            claimed.push(*nullifier);
        }

        seen.extend(claimed);
        Ok(true)
    }

    /// Pick transactions for a block built on a ledger of `ledger_size`
    /// nullifiers.
    ///
    /// Walks the pool in admission order. Stops once `max_transactions` are
    /// selected; a transaction that would overflow `max_bytes` is skipped so
    /// a smaller later one may still fit. Nothing is removed from the pool.
    pub async fn select_for_block(
        &self,
        ledger_size: u64,
        limits: &BlockLimits,
    ) -> Result<Selection, MempoolError> {
        let snapshot = self.ordered_transactions();
        let mut selection = Selection::default();
        let mut seen = SeenNullifiers::new();

        for tx in snapshot {
            if selection.transactions.len() >= limits.max_transactions {
                break;
            }

            let size = tx.size_bytes();
            if selection.total_bytes + size > limits.max_bytes {
                selection.skipped_for_size += 1;
                continue;
            }

            if self.is_valid_transaction(&tx, ledger_size, &mut seen).await? {
                selection.total_bytes += size;
                selection.total_fees = selection.total_fees.saturating_add(tx.fee);
                selection.transactions.push(tx);
            } else {
                selection.rejected += 1;
            }
        }

        selection.nullifiers = seen.into_vec();
        debug!(
            selected = selection.transactions.len(),
            rejected = selection.rejected,
            skipped_for_size = selection.skipped_for_size,
            ledger_size,
            "Selected transactions for block"
        );
        Ok(selection)
    }

    /// Drop transactions confirmed on chain. Returns how many were pooled.
    pub fn remove_confirmed(&self, ids: &[TransactionId]) -> usize {
        let mut inner = self.inner.write();
        let removed = ids.iter().filter(|id| inner.remove(id).is_some()).count();
        nc_telemetry::MEMPOOL_TRANSACTIONS.set(inner.by_id.len() as i64);
        if removed > 0 {
            debug!(removed, pool_size = inner.by_id.len(), "Removed confirmed transactions");
        }
        removed
    }

    /// Explicitly evict one transaction.
    pub fn evict(&self, id: &TransactionId) -> bool {
        let mut inner = self.inner.write();
        let evicted = inner.remove(id).is_some();
        nc_telemetry::MEMPOOL_TRANSACTIONS.set(inner.by_id.len() as i64);
        evicted
    }
}
