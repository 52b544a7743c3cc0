//! Adapters connecting the pool to the event bus.

pub mod subscriber;

pub use subscriber::ConfirmedBlockSubscriber;
