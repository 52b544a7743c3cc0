//! Candidate commitment assembly.

use shared_types::{Commitment, Transaction};
use tracing::trace;

use super::errors::CommitmentError;
use super::tree::IncrementalMerkleTree;

/// Note and nullifier commitments for a block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitmentRoots {
    pub note_commitment: Commitment,
    pub nullifier_commitment: Commitment,
}

/// Applies transactions to speculative copies of the chain's trees.
///
/// Takes the trees by value; callers pass clones of the canonical trees so
/// nothing is written back to the chain.
#[derive(Debug, Clone)]
pub struct CommitmentBuilder {
    notes: IncrementalMerkleTree,
    nullifiers: IncrementalMerkleTree,
}

impl CommitmentBuilder {
    pub fn new(notes: IncrementalMerkleTree, nullifiers: IncrementalMerkleTree) -> Self {
        Self { notes, nullifiers }
    }

    /// Append every note and every spend nullifier of `tx`, in order.
    pub fn add_transaction(&mut self, tx: &Transaction) -> Result<(), CommitmentError> {
        for note in &tx.notes {
            self.notes.append(note.0)?;
        }
        for nullifier in tx.nullifiers() {
            self.nullifiers.append(nullifier.0)?;
        }
        trace!(
            notes = self.notes.size(),
            nullifiers = self.nullifiers.size(),
            "Transaction applied to commitments"
        );
        Ok(())
    }

    /// Current roots and sizes.
    pub fn finish(&self) -> CommitmentRoots {
        CommitmentRoots {
            note_commitment: self.notes.commitment(),
            nullifier_commitment: self.nullifiers.commitment(),
        }
    }

    /// Hand back the updated trees.
    pub fn into_trees(self) -> (IncrementalMerkleTree, IncrementalMerkleTree) {
        (self.notes, self.nullifiers)
    }
}
