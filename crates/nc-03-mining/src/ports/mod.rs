//! Ports layer for the mining coordinator

pub mod inbound;
pub mod outbound;

pub use inbound::MiningService;
pub use outbound::{AddBlockResult, Chain, ChainSnapshot, VerifyResult};
