//! In-memory chain used by tests and single-process simulations.
//!
//! Keeps the whole main chain, the note and nullifier trees and an index of
//! confirmed nullifiers. There is no fork choice: a block is accepted only if
//! it extends the tip.

use async_trait::async_trait;
use nc_01_mempool::{MempoolError, NullifierLedger};
use nc_02_commitments::{CommitmentBuilder, IncrementalMerkleTree};
use parking_lot::RwLock;
use shared_bus::{BlockchainEvent, EventPublisher, InMemoryEventBus};
use shared_types::{
    short_hex, Block, BlockHeader, Hash, Nullifier, Target, Transaction, ZERO_HASH,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ChainError;
use crate::ports::{AddBlockResult, Chain, ChainSnapshot, VerifyResult};

/// Note tree and nullifier tree
type Trees = (IncrementalMerkleTree, IncrementalMerkleTree);

struct ChainState {
    /// `blocks[i]` has sequence `i + 1`
    blocks: Vec<Block>,
    by_hash: HashMap<Hash, u64>,
    notes: IncrementalMerkleTree,
    nullifiers: IncrementalMerkleTree,
    /// Confirmed nullifiers in confirmation order
    nullifier_list: Vec<Nullifier>,
    /// Nullifier to its position in `nullifier_list`
    nullifier_index: HashMap<Nullifier, u64>,
}

impl ChainState {
    fn tip(&self) -> &Block {
        // genesis is pushed at construction and never removed
        &self.blocks[self.blocks.len() - 1]
    }

    /// Check `block` against the tip and return the trees it produces.
    fn verify(&self, block: &Block, check_pow: bool) -> Result<Trees, String> {
        let parent = &self.tip().header;
        let header = &block.header;

        if header.previous_block_hash != parent.hash() {
            return Err(format!(
                "parent {} is not the tip",
                short_hex(&header.previous_block_hash)
            ));
        }
        if header.sequence != parent.sequence + 1 {
            return Err(format!(
                "sequence {} does not follow {}",
                header.sequence, parent.sequence
            ));
        }
        if header.timestamp_ms <= parent.timestamp_ms {
            return Err("timestamp not after parent".into());
        }

        let fees = block.transactions.iter().filter(|tx| tx.is_miners_fee()).count();
        if fees > 1 {
            return Err("more than one miner's fee".into());
        }

        let mut spent = HashSet::new();
        for tx in &block.transactions {
            if !tx.is_miners_fee() && tx.spends.is_empty() {
                return Err(format!("transaction {} spends nothing", tx.id()));
            }
            for nullifier in tx.nullifiers() {
                if !spent.insert(*nullifier) {
                    return Err(format!("nullifier {nullifier} spent twice in block"));
                }
                if self.nullifier_index.contains_key(nullifier) {
                    return Err(format!("nullifier {nullifier} already spent"));
                }
            }
        }

        let mut builder = CommitmentBuilder::new(self.notes.clone(), self.nullifiers.clone());
        for tx in &block.transactions {
            builder.add_transaction(tx).map_err(|e| e.to_string())?;
        }
        let roots = builder.finish();
        if roots.note_commitment != header.note_commitment {
            return Err("note commitment mismatch".into());
        }
        if roots.nullifier_commitment != header.nullifier_commitment {
            return Err("nullifier commitment mismatch".into());
        }

        if check_pow && !header.target.meets(&header.hash()) {
            return Err("hash does not meet target".into());
        }
        Ok(builder.into_trees())
    }

    /// Append a block together with the trees `verify` returned for it.
    fn append(&mut self, block: Block, (notes, nullifiers): Trees) {
        self.notes = notes;
        self.nullifiers = nullifiers;
        for nullifier in block.transactions.iter().flat_map(|tx| tx.nullifiers()) {
            self.nullifier_index
                .insert(*nullifier, self.nullifier_list.len() as u64);
            self.nullifier_list.push(*nullifier);
        }
        self.by_hash.insert(block.hash(), block.header.sequence);
        self.blocks.push(block);
    }
}

/// A single-branch chain held in memory
pub struct InMemoryChain {
    state: RwLock<ChainState>,
    bus: Arc<InMemoryEventBus>,
    available: AtomicBool,
    verify_pow: bool,
}

impl InMemoryChain {
    /// Create a chain holding only an empty genesis block.
    pub fn genesis(bus: Arc<InMemoryEventBus>, target: Target, timestamp_ms: u64) -> Self {
        let notes = IncrementalMerkleTree::new();
        let nullifiers = IncrementalMerkleTree::new();
        let genesis = Block {
            header: BlockHeader {
                sequence: 1,
                previous_block_hash: ZERO_HASH,
                note_commitment: notes.commitment(),
                nullifier_commitment: nullifiers.commitment(),
                target,
                randomness: 0,
                timestamp_ms,
                graffiti: [0u8; 32],
            },
            transactions: Vec::new(),
        };
        info!(
            hash = %short_hex(&genesis.hash()),
            "In-memory chain created from genesis"
        );

        let mut by_hash = HashMap::new();
        by_hash.insert(genesis.hash(), 1);
        Self {
            state: RwLock::new(ChainState {
                blocks: vec![genesis],
                by_hash,
                notes,
                nullifiers,
                nullifier_list: Vec::new(),
                nullifier_index: HashMap::new(),
            }),
            bus,
            available: AtomicBool::new(true),
            verify_pow: true,
        }
    }

    /// Accept blocks regardless of their proof-of-work.
    pub fn without_pow_check(mut self) -> Self {
        self.verify_pow = false;
        self
    }

    /// Simulate an outage: every query fails while unavailable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn height(&self) -> u64 {
        self.state.read().tip().header.sequence
    }

    pub fn tip(&self) -> Block {
        self.state.read().tip().clone()
    }

    pub fn block(&self, sequence: u64) -> Option<Block> {
        let index = sequence.checked_sub(1)? as usize;
        self.state.read().blocks.get(index).cloned()
    }

    pub fn block_by_hash(&self, hash: &Hash) -> Option<Block> {
        let state = self.state.read();
        let sequence = *state.by_hash.get(hash)?;
        state.blocks.get(sequence as usize - 1).cloned()
    }

    /// Append a block built by someone else on the current tip.
    ///
    /// Stands in for a block arriving from a peer: the header is assembled
    /// here with the tip's target and no proof-of-work is required.
    pub async fn extend_with(&self, transactions: Vec<Transaction>) -> Result<Block, ChainError> {
        self.check_available()?;
        let (block, event) = {
            let mut state = self.state.write();
            let parent = state.tip().header.clone();

            let mut builder = CommitmentBuilder::new(state.notes.clone(), state.nullifiers.clone());
            for tx in &transactions {
                builder
                    .add_transaction(tx)
                    .map_err(|e| ChainError::Storage(e.to_string()))?;
            }
            let roots = builder.finish();

            let block = Block {
                header: BlockHeader {
                    sequence: parent.sequence + 1,
                    previous_block_hash: parent.hash(),
                    note_commitment: roots.note_commitment,
                    nullifier_commitment: roots.nullifier_commitment,
                    target: parent.target,
                    randomness: 0,
                    timestamp_ms: parent.timestamp_ms + 1,
                    graffiti: [0u8; 32],
                },
                transactions,
            };
            let trees = state.verify(&block, false).map_err(ChainError::Storage)?;
            state.append(block.clone(), trees);
            let event = head_changed(&block);
            (block, event)
        };

        debug!(sequence = block.header.sequence, "External block appended");
        self.bus.publish(event).await;
        Ok(block)
    }

    fn check_available(&self) -> Result<(), ChainError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ChainError::Unavailable("chain offline".into()))
        }
    }
}

fn head_changed(block: &Block) -> BlockchainEvent {
    BlockchainEvent::ChainHeadChanged {
        header: block.header.clone(),
        transaction_ids: block.transaction_ids(),
    }
}

#[async_trait]
impl NullifierLedger for InMemoryChain {
    async fn nullifier_history_size(&self, at_sequence: u64) -> Result<u64, MempoolError> {
        self.check_available()?;
        if at_sequence == 0 {
            return Ok(0);
        }
        let state = self.state.read();
        state
            .blocks
            .get(at_sequence as usize - 1)
            .map(|block| block.header.nullifier_commitment.size)
            .ok_or_else(|| MempoolError::Ledger(format!("unknown sequence {at_sequence}")))
    }

    async fn nullifier_at(&self, position: u64) -> Result<Option<Nullifier>, MempoolError> {
        self.check_available()?;
        Ok(self.state.read().nullifier_list.get(position as usize).copied())
    }

    async fn contains_nullifier(
        &self,
        nullifier: &Nullifier,
        up_to_size: u64,
    ) -> Result<bool, MempoolError> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .nullifier_index
            .get(nullifier)
            .is_some_and(|position| *position < up_to_size))
    }
}

#[async_trait]
impl Chain for InMemoryChain {
    async fn head_hash(&self) -> Result<Hash, ChainError> {
        self.check_available()?;
        Ok(self.state.read().tip().hash())
    }

    async fn head_header(&self) -> Result<BlockHeader, ChainError> {
        self.check_available()?;
        Ok(self.state.read().tip().header.clone())
    }

    async fn snapshot(&self) -> Result<ChainSnapshot, ChainError> {
        self.check_available()?;
        let state = self.state.read();
        Ok(ChainSnapshot {
            header: state.tip().header.clone(),
            notes: state.notes.clone(),
            nullifiers: state.nullifiers.clone(),
        })
    }

    async fn verify_block_add(&self, block: &Block) -> Result<VerifyResult, ChainError> {
        self.check_available()?;
        Ok(match self.state.read().verify(block, self.verify_pow) {
            Ok(_) => VerifyResult::ok(),
            Err(reason) => VerifyResult::invalid(reason),
        })
    }

    async fn add_block(&self, block: Block) -> Result<AddBlockResult, ChainError> {
        self.check_available()?;
        let event = {
            let mut state = self.state.write();
            let trees = match state.verify(&block, self.verify_pow) {
                Ok(trees) => trees,
                Err(reason) => {
                    debug!(sequence = block.header.sequence, %reason, "Block not added");
                    return Ok(AddBlockResult::not_added(reason));
                }
            };
            info!(
                sequence = block.header.sequence,
                hash = %short_hex(&block.hash()),
                spends = block.spend_count(),
                notes = block.note_count(),
                "Block added to chain"
            );
            let event = head_changed(&block);
            state.append(block, trees);
            event
        };

        self.bus.publish(event).await;
        Ok(AddBlockResult::added())
    }
}
