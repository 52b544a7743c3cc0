//! Adapters layer for the mining coordinator

pub mod memory_chain;

pub use memory_chain::InMemoryChain;
