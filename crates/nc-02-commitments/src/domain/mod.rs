//! Domain layer for commitment trees.

pub mod builder;
pub mod errors;
pub mod tree;
