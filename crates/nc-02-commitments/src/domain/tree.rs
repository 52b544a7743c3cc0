//! Frontier-based incremental merkle tree.

use sha3::{Digest, Sha3_256};
use shared_types::{Commitment, Hash};
use std::sync::Arc;

use super::errors::CommitmentError;

/// Default depth for note and nullifier trees (2^32 leaves).
pub const DEFAULT_TREE_DEPTH: u8 = 32;

/// Largest supported depth; leaf counts are tracked in a `u64`.
pub const MAX_TREE_DEPTH: u8 = 63;

/// Value of an unused leaf slot.
const EMPTY_LEAF: Hash = [0u8; 32];

/// Hash two sibling nodes: SHA3-256(left || right).
pub(crate) fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha3_256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Roots of empty subtrees, indexed by level (0 = leaf).
fn zero_hashes(depth: u8) -> Vec<Hash> {
    let mut zeros = Vec::with_capacity(depth as usize + 1);
    zeros.push(EMPTY_LEAF);
    for level in 0..depth as usize {
        let below = zeros[level];
        zeros.push(hash_pair(&below, &below));
    }
    zeros
}

/// Append-only merkle tree that keeps only its frontier.
///
/// `frontier[level]` holds the most recent left child at `level` still
/// waiting for a right sibling. Appending recomputes the single path from the
/// new leaf to the root, so `append` costs `depth` hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementalMerkleTree {
    depth: u8,
    size: u64,
    frontier: Vec<Hash>,
    root: Hash,
    zeros: Arc<Vec<Hash>>,
}

impl IncrementalMerkleTree {
    /// Create an empty tree of [`DEFAULT_TREE_DEPTH`].
    pub fn new() -> Self {
        Self::empty(DEFAULT_TREE_DEPTH)
    }

    /// Create an empty tree with a custom depth.
    pub fn with_depth(depth: u8) -> Result<Self, CommitmentError> {
        if depth == 0 || depth > MAX_TREE_DEPTH {
            return Err(CommitmentError::InvalidDepth(depth));
        }
        Ok(Self::empty(depth))
    }

    fn empty(depth: u8) -> Self {
        let zeros = zero_hashes(depth);
        Self {
            depth,
            size: 0,
            frontier: zeros[..depth as usize].to_vec(),
            root: zeros[depth as usize],
            zeros: Arc::new(zeros),
        }
    }

    /// Build a tree by appending `leaves` in order.
    pub fn from_leaves<'a>(
        depth: u8,
        leaves: impl IntoIterator<Item = &'a Hash>,
    ) -> Result<Self, CommitmentError> {
        let mut tree = Self::with_depth(depth)?;
        for leaf in leaves {
            tree.append(*leaf)?;
        }
        Ok(tree)
    }

    /// Append a leaf, returning its position.
    pub fn append(&mut self, leaf: Hash) -> Result<u64, CommitmentError> {
        if self.size >= self.capacity() {
            return Err(CommitmentError::TreeFull {
                depth: self.depth,
                capacity: self.capacity(),
            });
        }

        let position = self.size;
        let mut index = position;
        let mut node = leaf;
        for level in 0..self.depth as usize {
            if index & 1 == 0 {
                self.frontier[level] = node;
                node = hash_pair(&node, &self.zeros[level]);
            } else {
                node = hash_pair(&self.frontier[level], &node);
            }
            index >>= 1;
        }

        self.root = node;
        self.size += 1;
        Ok(position)
    }

    /// Number of leaves appended so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Current root.
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Tree depth.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Maximum number of leaves.
    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    /// Root and size as a header commitment.
    pub fn commitment(&self) -> Commitment {
        Commitment {
            root: self.root,
            size: self.size,
        }
    }
}

impl Default for IncrementalMerkleTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn leaf(n: u8) -> Hash {
        [n; 32]
    }

    /// Recompute the root from all leaves, level by level.
    fn naive_root(depth: u8, leaves: &[Hash]) -> Hash {
        let mut level: Vec<Hash> = leaves.to_vec();
        level.resize(1usize << depth, EMPTY_LEAF);
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| hash_pair(&pair[0], &pair[1]))
                .collect();
        }
        level[0]
    }

    #[test]
    fn test_empty_tree_root_is_zero_subtree() {
        let tree = IncrementalMerkleTree::with_depth(4).unwrap();
        assert_eq!(tree.size(), 0);
        assert_eq!(tree.root(), zero_hashes(4)[4]);
        assert_eq!(tree.root(), naive_root(4, &[]));
    }

    #[test]
    fn test_append_matches_full_rebuild() {
        let mut tree = IncrementalMerkleTree::with_depth(3).unwrap();
        let leaves: Vec<Hash> = (1..=5).map(leaf).collect();
        for (i, l) in leaves.iter().enumerate() {
            assert_eq!(tree.append(*l).unwrap(), i as u64);
            assert_eq!(tree.root(), naive_root(3, &leaves[..=i]));
        }
        assert_eq!(tree.commitment().size, 5);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut canonical = IncrementalMerkleTree::new();
        canonical.append(leaf(1)).unwrap();
        let before = canonical.commitment();

        let mut speculative = canonical.clone();
        speculative.append(leaf(2)).unwrap();

        assert_eq!(canonical.commitment(), before);
        assert_ne!(speculative.root(), before.root);
        assert_eq!(speculative.size(), 2);
    }

    #[test]
    fn test_tree_full() {
        let mut tree = IncrementalMerkleTree::with_depth(2).unwrap();
        for n in 0..4 {
            tree.append(leaf(n)).unwrap();
        }
        let root = tree.root();
        assert_eq!(
            tree.append(leaf(9)),
            Err(CommitmentError::TreeFull {
                depth: 2,
                capacity: 4
            })
        );
        // A failed append leaves the tree untouched
        assert_eq!(tree.root(), root);
        assert_eq!(tree.size(), 4);
    }

    #[test]
    fn test_invalid_depth() {
        assert_eq!(
            IncrementalMerkleTree::with_depth(0),
            Err(CommitmentError::InvalidDepth(0))
        );
        assert_eq!(
            IncrementalMerkleTree::with_depth(64),
            Err(CommitmentError::InvalidDepth(64))
        );
    }

    #[test]
    fn test_order_matters() {
        let a = IncrementalMerkleTree::from_leaves(8, &[leaf(1), leaf(2)]).unwrap();
        let b = IncrementalMerkleTree::from_leaves(8, &[leaf(2), leaf(1)]).unwrap();
        assert_ne!(a.root(), b.root());
    }

    proptest! {
        #[test]
        fn prop_incremental_root_matches_naive(raw in proptest::collection::vec(any::<[u8; 32]>(), 0..16)) {
            let tree = IncrementalMerkleTree::from_leaves(4, &raw).unwrap();
            prop_assert_eq!(tree.root(), naive_root(4, &raw));
            prop_assert_eq!(tree.size(), raw.len() as u64);
        }
    }
}
