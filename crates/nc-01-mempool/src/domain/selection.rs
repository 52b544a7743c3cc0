//! Block selection value objects.

use serde::{Deserialize, Serialize};
use shared_types::{Nullifier, Transaction};
use std::collections::HashSet;
use std::sync::Arc;

/// Size limits for one block's transaction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLimits {
    /// Maximum number of pool transactions selected.
    pub max_transactions: usize,
    /// Maximum total `size_bytes` of the selected transactions.
    pub max_bytes: usize,
}

impl Default for BlockLimits {
    fn default() -> Self {
        Self {
            max_transactions: 1_000,
            max_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Nullifiers already claimed during one selection pass, in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenNullifiers {
    order: Vec<Nullifier>,
    index: HashSet<Nullifier>,
}

impl SeenNullifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, nullifier: &Nullifier) -> bool {
        self.index.contains(nullifier)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[Nullifier] {
        &self.order
    }

    pub fn into_vec(self) -> Vec<Nullifier> {
        self.order
    }

    /// Append nullifiers already checked to be absent.
    pub(crate) fn extend(&mut self, nullifiers: Vec<Nullifier>) {
        for nullifier in nullifiers {
            self.index.insert(nullifier);
            self.order.push(nullifier);
        }
    }
}

/// Result of one selection pass.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Accepted transactions in pool order.
    pub transactions: Vec<Arc<Transaction>>,
    /// Every nullifier spent by the accepted transactions, in order.
    pub nullifiers: Vec<Nullifier>,
    /// Transactions rejected by the nullifier checks.
    pub rejected: usize,
    /// Transactions skipped because they would exceed `max_bytes`.
    pub skipped_for_size: usize,
    /// Sum of accepted fees.
    pub total_fees: u64,
    /// Sum of accepted `size_bytes`.
    pub total_bytes: usize,
}

impl Selection {
    pub fn spend_count(&self) -> usize {
        self.nullifiers.len()
    }
}
