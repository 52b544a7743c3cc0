//! Candidate blocks and the table that matches late solutions to them.

use lru::LruCache;
use shared_types::{Block, BlockHeader, Hash, Transaction, U256};
use std::num::NonZeroUsize;
use std::sync::Arc;

/// A block template handed to external miners.
///
/// `header.randomness` is zero; the miner reports the value that satisfies
/// `header.target` together with `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateBlock {
    /// Ephemeral id, unique for the coordinator's lifetime
    pub id: u64,
    pub header: BlockHeader,
    /// Miner's fee first (when included), then pool transactions
    pub transactions: Vec<Arc<Transaction>>,
    pub difficulty: U256,
    /// Local clock when the candidate was assembled
    pub created_at_ms: u64,
}

impl CandidateBlock {
    /// Hash of the head this candidate extends.
    pub fn parent_hash(&self) -> Hash {
        self.header.previous_block_hash
    }

    pub fn sequence(&self) -> u64 {
        self.header.sequence
    }

    /// The full block with the miner's `randomness` applied.
    pub fn to_block(&self, randomness: u64) -> Block {
        let mut header = self.header.clone();
        header.randomness = randomness;
        Block {
            header,
            transactions: self
                .transactions
                .iter()
                .map(|tx| Transaction::clone(tx))
                .collect(),
        }
    }

    /// Transactions that came from the pool.
    pub fn pool_transactions(&self) -> impl Iterator<Item = &Arc<Transaction>> {
        self.transactions.iter().filter(|tx| !tx.is_miners_fee())
    }
}

/// Bounded table of recently issued candidates keyed by id.
///
/// The least recently issued entry is evicted once `capacity` is exceeded.
/// Entries built on a superseded head are dropped by [`retain_parent`].
///
/// [`retain_parent`]: RecentCandidates::retain_parent
#[derive(Debug)]
pub struct RecentCandidates {
    entries: LruCache<u64, Arc<CandidateBlock>>,
}

impl RecentCandidates {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Store a candidate, returning any entry evicted to make room.
    pub fn insert(&mut self, candidate: Arc<CandidateBlock>) -> Option<Arc<CandidateBlock>> {
        self.entries
            .push(candidate.id, candidate)
            .map(|(_, evicted)| evicted)
    }

    /// Look up without refreshing recency.
    pub fn get(&self, id: u64) -> Option<Arc<CandidateBlock>> {
        self.entries.peek(&id).cloned()
    }

    pub fn remove(&mut self, id: u64) -> Option<Arc<CandidateBlock>> {
        self.entries.pop(&id)
    }

    /// Drop every candidate whose parent is not `head`. Returns how many
    /// were dropped.
    pub fn retain_parent(&mut self, head: &Hash) -> usize {
        let stale: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, candidate)| candidate.parent_hash() != *head)
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            self.entries.pop(id);
        }
        stale.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Commitment, MinerAccount, Target};

    fn candidate(id: u64, parent: u8) -> Arc<CandidateBlock> {
        Arc::new(CandidateBlock {
            id,
            header: BlockHeader {
                sequence: 2,
                previous_block_hash: [parent; 32],
                note_commitment: Commitment::default(),
                nullifier_commitment: Commitment::default(),
                target: Target::MAX,
                randomness: 0,
                timestamp_ms: 10,
                graffiti: [0; 32],
            },
            transactions: vec![Arc::new(Transaction::miners_fee(
                &MinerAccount::burn(),
                2,
                5,
            ))],
            difficulty: U256::one(),
            created_at_ms: 10,
        })
    }

    #[test]
    fn test_insert_and_get() {
        let mut table = RecentCandidates::new(4);
        assert!(table.insert(candidate(1, 0xAA)).is_none());

        assert_eq!(table.get(1).map(|c| c.id), Some(1));
        assert!(table.get(2).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_oldest_evicted_at_capacity() {
        let mut table = RecentCandidates::new(2);
        table.insert(candidate(1, 0xAA));
        table.insert(candidate(2, 0xAA));
        // Lookups must not change which entry goes first
        table.get(1);

        let evicted = table.insert(candidate(3, 0xAA));
        assert_eq!(evicted.map(|c| c.id), Some(1));
        assert!(table.get(1).is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_retain_parent_drops_superseded() {
        let mut table = RecentCandidates::new(8);
        table.insert(candidate(1, 0xAA));
        table.insert(candidate(2, 0xAA));
        table.insert(candidate(3, 0xBB));

        assert_eq!(table.retain_parent(&[0xBB; 32]), 2);
        assert!(table.get(1).is_none());
        assert!(table.get(2).is_none());
        assert!(table.get(3).is_some());
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut table = RecentCandidates::new(0);
        assert_eq!(table.capacity(), 1);
        table.insert(candidate(1, 0));
        table.insert(candidate(2, 0));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_to_block_applies_randomness() {
        let c = candidate(7, 0x11);
        let block = c.to_block(42);

        assert_eq!(block.header.randomness, 42);
        assert_eq!(c.header.randomness, 0);
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(c.pool_transactions().count(), 0);
        assert_eq!(c.parent_hash(), [0x11; 32]);
    }
}
