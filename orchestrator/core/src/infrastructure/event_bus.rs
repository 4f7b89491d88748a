// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Domain Events
//
// Provides in-memory event streaming using tokio broadcast channels.
// Enables real-time event streaming to CLI, admin-status endpoints, and
// the cache-invalidation bus (application::cache_bus).
//
// In-memory only: events are lost on restart, which is fine for cache
// invalidation and progress streaming (both are re-derived from repository
// state), and is the same tradeoff the MVP event bus this is based on made.

use crate::domain::events::GatewayEvent;
use tokio::sync::broadcast;
use tracing::warn;

/// Event bus for publishing and subscribing to domain events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GatewayEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish(&self, event: GatewayEvent) {
        let _receiver_count = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver { receiver: self.sender.subscribe() }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<GatewayEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<GatewayEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    pub fn try_recv(&mut self) -> Result<GatewayEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("event bus closed")]
    Closed,
    #[error("receiver lagged by {0} events")]
    Lagged(u64),
    #[error("no events available")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{CacheInvalidation, CacheScope};

    #[tokio::test]
    async fn publishes_and_receives() {
        let bus = EventBus::with_default_capacity();
        let mut rx = bus.subscribe();
        bus.publish(GatewayEvent::Cache(CacheInvalidation {
            scope: CacheScope::Directory,
            mount_id: Some("m1".into()),
            storage_config_id: None,
        }));
        let event = rx.recv().await.unwrap();
        matches!(event, GatewayEvent::Cache(_));
    }
}
