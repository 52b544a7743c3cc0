//! # Shared Bus - In-Process Event Bus
//!
//! Carries chain, mining and mempool notifications between the components
//! of the mining core.
//!
//! ```text
//! ┌──────────────┐   ChainHeadChanged   ┌───────────────────┐
//! │    Chain     │ ───────┐             │ MiningCoordinator │
//! └──────────────┘        │             └───────────────────┘
//!                         ▼                    ↑      │
//!                  ┌──────────────┐            │      │ CandidateReady
//!                  │  Event Bus   │ ───────────┘      │ NewBlockMined
//!                  │              │ ◄─────────────────┘
//!                  └──────────────┘
//! ```
//!
//! Delivery is best effort: a subscriber that falls more than the channel
//! capacity behind skips the oldest events and keeps going.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{BlockchainEvent, EventFilter, EventTopic};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
