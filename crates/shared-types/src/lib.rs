//! # Shared Types Crate
//!
//! Chain entities consumed by every crate of the mining core.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: header layout, transaction identity and the
//!   PoW target live here and nowhere else.
//! - **Immutable Entities**: transactions and headers are plain values; the
//!   only header field mutated after assembly is `randomness`.
//! - **Deterministic Encoding**: `BlockHeader::to_bytes` is the exact byte
//!   string handed to external miners and hashed for proof-of-work.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
