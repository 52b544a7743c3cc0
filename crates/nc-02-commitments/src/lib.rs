//! # Commitment Trees
//!
//! Append-only merkle trees over note commitments and nullifiers, plus the
//! builder that applies a candidate block's transactions to speculative
//! copies of the canonical trees.
//!
//! ## Tree Shape
//!
//! ```text
//!                 root
//!               /      \
//!            H(a,b)    H(c,Z1)
//!            /   \      /   \
//!           a     b    c    Z0     Z_n = zero hash of an empty subtree at level n
//! ```
//!
//! Only the rightmost path (the frontier) is stored, so a clone costs
//! `depth` hashes regardless of how many leaves the tree holds.

pub mod domain;

pub use domain::builder::{CommitmentBuilder, CommitmentRoots};
pub use domain::errors::CommitmentError;
pub use domain::tree::{IncrementalMerkleTree, DEFAULT_TREE_DEPTH, MAX_TREE_DEPTH};
