//! Event subscriber adapter for the transaction pool.
//!
//! Removes transactions from the pool once the chain confirms them, whether
//! the block was mined locally or arrived from elsewhere.

use shared_bus::{BlockchainEvent, EventFilter, EventTopic, InMemoryEventBus, Subscription};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::TransactionPool;

/// Listens for `ChainHeadChanged` and drops the confirmed transactions.
pub struct ConfirmedBlockSubscriber {
    pool: Arc<TransactionPool>,
}

impl ConfirmedBlockSubscriber {
    pub fn new(pool: Arc<TransactionPool>) -> Self {
        Self { pool }
    }

    /// Apply one event. Returns how many pooled transactions were removed.
    pub fn handle_event(&self, event: &BlockchainEvent) -> usize {
        match event {
            BlockchainEvent::ChainHeadChanged {
                header,
                transaction_ids,
            } => {
                let removed = self.pool.remove_confirmed(transaction_ids);
                debug!(
                    sequence = header.sequence,
                    removed, "Pool pruned for new head"
                );
                removed
            }
            _ => 0,
        }
    }

    /// Subscribe to chain events on `bus` and prune until `cancel` fires or
    /// the bus closes.
    pub fn spawn(self, bus: &InMemoryEventBus, cancel: CancellationToken) -> JoinHandle<()> {
        let subscription = bus.subscribe(EventFilter::topics(vec![EventTopic::Chain]));
        tokio::spawn(self.run(subscription, cancel))
    }

    async fn run(self, mut subscription: Subscription, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = subscription.recv() => match event {
                    Some(event) => {
                        self.handle_event(&event);
                    }
                    None => break,
                },
            }
        }
        info!("Confirmed-block subscriber stopped");
    }
}
