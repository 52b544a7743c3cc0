//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Spends**: `Nullifier`, `NoteCommitment`, `SpendDescriptor`
//! - **Transactions**: `Transaction`, `TransactionKind`, `TransactionId`
//! - **Chain**: `Commitment`, `Target`, `BlockHeader`, `Block`
//! - **Mining**: `MinerAccount`

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::errors::DecodeError;

// Re-export U256 from primitive-types for use across all crates
pub use primitive_types::U256;

/// A 32-byte hash (SHA-256 for blocks and transactions, SHA3-256 for trees).
pub type Hash = [u8; 32];

/// The all-zero hash used as the genesis parent.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Encoded size of a block header in bytes.
pub const HEADER_SIZE: usize = 8 + 32 + (32 + 8) + (32 + 8) + 32 + 8 + 8 + 32;

/// Hex of the first 8 bytes of a hash, for log fields.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..8])
}

// =============================================================================
// CLUSTER A: SPENDS
// =============================================================================

/// Marker proving a specific note has been spent.
///
/// A nullifier may appear at most once across confirmed history and at most
/// once across the transactions of a single block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Nullifier(pub [u8; 32]);

impl fmt::Display for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nullifier({})", short_hex(&self.0))
    }
}

/// Commitment to a newly created note.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteCommitment(pub [u8; 32]);

impl fmt::Debug for NoteCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NoteCommitment({})", short_hex(&self.0))
    }
}

/// A single spend inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendDescriptor {
    /// Unique spend marker.
    pub nullifier: Nullifier,
    /// Note-tree root the spend was proven against.
    pub commitment: Hash,
}

// =============================================================================
// CLUSTER B: TRANSACTIONS
// =============================================================================

/// Transaction identity (SHA-256 over the transaction fields).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub Hash);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", short_hex(&self.0))
    }
}

/// Distinguishes user transfers from the block reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// User transaction spending existing notes.
    Transfer,
    /// Block reward paid to the miner; spends nothing.
    MinersFee {
        /// Reward plus collected fees.
        amount: u64,
    },
}

/// An immutable transaction.
///
/// Signature and proof validity are checked before a transaction reaches the
/// pool; the mining core only enforces spend uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transfer or miner's fee.
    pub kind: TransactionKind,
    /// Ordered spends. Non-empty for transfers.
    pub spends: Vec<SpendDescriptor>,
    /// Notes created by this transaction.
    pub notes: Vec<NoteCommitment>,
    /// Fee paid to the miner.
    pub fee: u64,
    /// Opaque payload (proofs, encrypted notes, memo).
    pub payload: Vec<u8>,
}

impl Transaction {
    /// Create a transfer transaction.
    pub fn new(
        spends: Vec<SpendDescriptor>,
        notes: Vec<NoteCommitment>,
        fee: u64,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            kind: TransactionKind::Transfer,
            spends,
            notes,
            fee,
            payload,
        }
    }

    /// Create the reward transaction for a block at `sequence`.
    ///
    /// The single output note commits to the miner's address, the block
    /// sequence and the amount, so two blocks never share a reward note.
    pub fn miners_fee(account: &MinerAccount, sequence: u64, amount: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"notechain.miners_fee");
        hasher.update(account.public_address);
        hasher.update(sequence.to_be_bytes());
        hasher.update(amount.to_be_bytes());
        let note = NoteCommitment(hasher.finalize().into());

        Self {
            kind: TransactionKind::MinersFee { amount },
            spends: Vec::new(),
            notes: vec![note],
            fee: 0,
            payload: Vec::new(),
        }
    }

    /// Compute the transaction identity.
    pub fn id(&self) -> TransactionId {
        let mut hasher = Sha256::new();
        match self.kind {
            TransactionKind::Transfer => hasher.update([0u8]),
            TransactionKind::MinersFee { amount } => {
                hasher.update([1u8]);
                hasher.update(amount.to_be_bytes());
            }
        }
        hasher.update((self.spends.len() as u64).to_be_bytes());
        for spend in &self.spends {
            hasher.update(spend.nullifier.0);
            hasher.update(spend.commitment);
        }
        hasher.update((self.notes.len() as u64).to_be_bytes());
        for note in &self.notes {
            hasher.update(note.0);
        }
        hasher.update(self.fee.to_be_bytes());
        hasher.update(&self.payload);
        TransactionId(hasher.finalize().into())
    }

    /// Returns true for the block reward transaction.
    pub fn is_miners_fee(&self) -> bool {
        matches!(self.kind, TransactionKind::MinersFee { .. })
    }

    /// Nullifiers in spend order.
    pub fn nullifiers(&self) -> impl Iterator<Item = &Nullifier> {
        self.spends.iter().map(|spend| &spend.nullifier)
    }

    /// Approximate serialized size used by block-size policy.
    pub fn size_bytes(&self) -> usize {
        // kind + counts + fee
        let fixed = 9 + 8 + 8 + 8;
        fixed + self.spends.len() * 64 + self.notes.len() * 32 + self.payload.len()
    }
}

// =============================================================================
// CLUSTER C: CHAIN
// =============================================================================

/// Root and leaf count of an append-only merkle tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Commitment {
    /// Merkle root over the first `size` leaves.
    pub root: Hash,
    /// Number of leaves committed to.
    pub size: u64,
}

/// Proof-of-work ceiling: a header hash is valid when it is numerically at
/// or below the target.
///
/// HIGHER target = EASIER. Difficulty is `U256::MAX / target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Target(pub U256);

impl Target {
    /// The easiest possible target (difficulty 1).
    pub const MAX: Target = Target(U256::MAX);

    /// Convert a difficulty into a target. Difficulties below 1 map to `MAX`.
    pub fn from_difficulty(difficulty: U256) -> Self {
        if difficulty <= U256::one() {
            Self::MAX
        } else {
            Self(U256::MAX / difficulty)
        }
    }

    /// Difficulty represented by this target.
    pub fn difficulty(&self) -> U256 {
        if self.0.is_zero() {
            U256::MAX
        } else {
            U256::MAX / self.0
        }
    }

    /// True iff the big-endian integer of `hash` is at or below the target.
    pub fn meets(&self, hash: &Hash) -> bool {
        U256::from_big_endian(hash) <= self.0
    }

    /// Big-endian bytes of the target.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        self.0.to_big_endian(&mut bytes);
        bytes
    }
}

/// Block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Height of this block (genesis = 1).
    pub sequence: u64,
    /// Hash of the parent header.
    pub previous_block_hash: Hash,
    /// Note tree after this block's notes.
    pub note_commitment: Commitment,
    /// Nullifier tree after this block's spends.
    pub nullifier_commitment: Commitment,
    /// Proof-of-work target.
    pub target: Target,
    /// Filled in by the miner.
    pub randomness: u64,
    /// Milliseconds since UNIX epoch.
    pub timestamp_ms: u64,
    /// Free-form miner tag.
    pub graffiti: [u8; 32],
}

impl BlockHeader {
    /// Fixed-layout big-endian encoding handed to miners.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        bytes.extend_from_slice(&self.sequence.to_be_bytes());
        bytes.extend_from_slice(&self.previous_block_hash);
        bytes.extend_from_slice(&self.note_commitment.root);
        bytes.extend_from_slice(&self.note_commitment.size.to_be_bytes());
        bytes.extend_from_slice(&self.nullifier_commitment.root);
        bytes.extend_from_slice(&self.nullifier_commitment.size.to_be_bytes());
        bytes.extend_from_slice(&self.target.to_bytes());
        bytes.extend_from_slice(&self.randomness.to_be_bytes());
        bytes.extend_from_slice(&self.timestamp_ms.to_be_bytes());
        bytes.extend_from_slice(&self.graffiti);
        bytes
    }

    /// Decode a header produced by [`BlockHeader::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != HEADER_SIZE {
            return Err(DecodeError::InvalidLength {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let mut reader = ByteReader { bytes, offset: 0 };
        Ok(Self {
            sequence: reader.u64(),
            previous_block_hash: reader.hash(),
            note_commitment: Commitment {
                root: reader.hash(),
                size: reader.u64(),
            },
            nullifier_commitment: Commitment {
                root: reader.hash(),
                size: reader.u64(),
            },
            target: Target(U256::from_big_endian(&reader.hash())),
            randomness: reader.u64(),
            timestamp_ms: reader.u64(),
            graffiti: reader.hash(),
        })
    }

    /// SHA-256 of the encoded header.
    pub fn hash(&self) -> Hash {
        Sha256::digest(self.to_bytes()).into()
    }
}

/// Cursor over a length-checked header buffer.
struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl ByteReader<'_> {
    fn u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.bytes[self.offset..self.offset + 8]);
        self.offset += 8;
        u64::from_be_bytes(buf)
    }

    fn hash(&mut self) -> Hash {
        let mut buf = [0u8; 32];
        buf.copy_from_slice(&self.bytes[self.offset..self.offset + 32]);
        self.offset += 32;
        buf
    }
}

/// A full block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// Transactions, miner's fee (if any) first.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Hash of the header.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Identities of all transactions in block order.
    pub fn transaction_ids(&self) -> Vec<TransactionId> {
        self.transactions.iter().map(Transaction::id).collect()
    }

    /// Total spends across all transactions.
    pub fn spend_count(&self) -> u64 {
        self.transactions.iter().map(|tx| tx.spends.len() as u64).sum()
    }

    /// Total notes across all transactions.
    pub fn note_count(&self) -> u64 {
        self.transactions.iter().map(|tx| tx.notes.len() as u64).sum()
    }
}

// =============================================================================
// CLUSTER D: MINING
// =============================================================================

/// The account receiving block rewards.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerAccount {
    /// Public spend address.
    #[serde_as(as = "Hex")]
    pub public_address: [u8; 32],
    /// Incoming view key.
    #[serde_as(as = "Hex")]
    pub view_key: [u8; 32],
}

impl MinerAccount {
    /// Create an account from raw key material.
    pub fn new(public_address: [u8; 32], view_key: [u8; 32]) -> Self {
        Self {
            public_address,
            view_key,
        }
    }

    /// Account used when mining is forced without a configured account.
    pub fn burn() -> Self {
        Self::new([0u8; 32], [0u8; 32])
    }
}

impl fmt::Debug for MinerAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinerAccount")
            .field("public_address", &hex::encode(self.public_address))
            .field("view_key", &"<redacted>")
            .finish()
    }
}
