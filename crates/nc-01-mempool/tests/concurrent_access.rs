//! Concurrent admission, selection and confirmation against one pool.

use async_trait::async_trait;
use nc_01_mempool::{
    BlockLimits, MempoolConfig, MempoolError, NullifierLedger, TransactionPool,
};
use parking_lot::RwLock;
use shared_types::{NoteCommitment, Nullifier, SpendDescriptor, Transaction};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Default)]
struct SharedLedger {
    nullifiers: RwLock<Vec<Nullifier>>,
}

#[async_trait]
impl NullifierLedger for SharedLedger {
    async fn nullifier_history_size(&self, _at_sequence: u64) -> Result<u64, MempoolError> {
        Ok(self.nullifiers.read().len() as u64)
    }

    async fn nullifier_at(&self, position: u64) -> Result<Option<Nullifier>, MempoolError> {
        Ok(self.nullifiers.read().get(position as usize).copied())
    }

    async fn contains_nullifier(
        &self,
        nullifier: &Nullifier,
        up_to_size: u64,
    ) -> Result<bool, MempoolError> {
        tokio::task::yield_now().await;
        Ok(self
            .nullifiers
            .read()
            .iter()
            .take(up_to_size as usize)
            .any(|n| n == nullifier))
    }
}

fn transfer(worker: u8, index: u8, shared: bool) -> Transaction {
    // Every fourth transaction re-spends a nullifier shared by all workers
    let nullifier = if shared {
        Nullifier([0xFF; 32])
    } else {
        let mut bytes = [0u8; 32];
        bytes[0] = worker;
        bytes[1] = index;
        Nullifier(bytes)
    };
    Transaction::new(
        vec![SpendDescriptor {
            nullifier,
            commitment: [0; 32],
        }],
        vec![NoteCommitment([index; 32])],
        u64::from(index),
        vec![worker],
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_selection_during_concurrent_admission() {
    let ledger = Arc::new(SharedLedger::default());
    let pool = Arc::new(TransactionPool::new(MempoolConfig::default(), ledger.clone()));

    let mut writers = Vec::new();
    for worker in 0..4u8 {
        let pool = pool.clone();
        writers.push(tokio::spawn(async move {
            for index in 0..50u8 {
                pool.accept_transaction(transfer(worker, index, index % 4 == 0));
                tokio::task::yield_now().await;
            }
        }));
    }

    let reader = {
        let pool = pool.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                let selection = pool
                    .select_for_block(0, &BlockLimits::default())
                    .await
                    .unwrap();
                let unique: HashSet<_> = selection.nullifiers.iter().collect();
                assert_eq!(unique.len(), selection.nullifiers.len());
                tokio::task::yield_now().await;
            }
        })
    };

    for writer in writers {
        writer.await.unwrap();
    }
    reader.await.unwrap();

    assert_eq!(pool.size(), 200);

    // Only one claimant of the shared nullifier can make it into a block
    let selection = pool
        .select_for_block(0, &BlockLimits::default())
        .await
        .unwrap();
    let shared = Nullifier([0xFF; 32]);
    assert_eq!(
        selection.nullifiers.iter().filter(|n| **n == shared).count(),
        1
    );
    assert_eq!(selection.transactions.len(), 200 - 4 * 13 + 1);
    assert_eq!(pool.size(), 200);

    let ids: Vec<_> = selection.transactions.iter().map(|t| t.id()).collect();
    assert_eq!(pool.remove_confirmed(&ids), ids.len());
    assert_eq!(pool.size(), 4 * 13 - 1);
}
