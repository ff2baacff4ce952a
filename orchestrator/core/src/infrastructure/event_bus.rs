// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Event Bus - Pub/Sub for dispatch and learning events
//
// In-memory broadcast channel shared by the dispatch orchestrator and the
// cortex learning services. Hosts subscribe for logs or live streams; events
// are not persisted.

use anyhow::Result;
use async_trait::async_trait;
use concierge_cortex::application::EventBus as CortexEventBus;
use concierge_cortex::domain::events::CortexEvent;
use concierge_cortex::domain::UserId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::DispatchEvent;

const DEFAULT_CAPACITY: usize = 1000;

/// Unified event type carried by the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "stream", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Dispatch(DispatchEvent),
    Cortex(CortexEvent),
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::Dispatch(event) => event.event_type(),
            DomainEvent::Cortex(event) => event.event_type(),
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Capacity is the number of buffered events before slow receivers lag
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    pub fn publish_dispatch_event(&self, event: DispatchEvent) {
        self.send(DomainEvent::Dispatch(event));
    }

    pub fn publish_cortex_event(&self, event: CortexEvent) {
        self.send(DomainEvent::Cortex(event));
    }

    fn send(&self, event: DomainEvent) {
        debug!(event_type = event.event_type(), "Publishing event");

        // Err only means nobody is listening
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Dispatch events of one user only
    pub fn subscribe_user(&self, user_id: UserId) -> UserEventReceiver {
        UserEventReceiver {
            receiver: self.sender.subscribe(),
            user_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl CortexEventBus for EventBus {
    async fn publish(&self, event: CortexEvent) -> Result<()> {
        self.publish_cortex_event(event);
        Ok(())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

pub struct UserEventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    user_id: UserId,
}

impl UserEventReceiver {
    /// Next dispatch event for this user; everything else is skipped
    pub async fn recv(&mut self) -> Result<DispatchEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if let DomainEvent::Dispatch(dispatch) = event {
                if dispatch.user_id() == &self.user_id {
                    return Ok(dispatch);
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use concierge_cortex::domain::ToolId;

    fn completed(user: &str) -> DispatchEvent {
        DispatchEvent::TurnCompleted {
            user_id: UserId::new(user),
            tool_id: ToolId::new("search_videos"),
            success: true,
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus.publish_dispatch_event(completed("alice"));

        match receiver.recv().await.unwrap() {
            DomainEvent::Dispatch(DispatchEvent::TurnCompleted { user_id, .. }) => {
                assert_eq!(user_id.as_str(), "alice");
            }
            other => panic!("Wrong event received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_user_event_filtering() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe_user(UserId::new("alice"));

        event_bus.publish_dispatch_event(completed("bob"));
        event_bus.publish_cortex_event(CortexEvent::HistoryAnalyzed {
            turns_analyzed: 1,
            keywords_added: 0,
            timestamp: Utc::now(),
        });
        event_bus.publish_dispatch_event(completed("alice"));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.user_id().as_str(), "alice");
    }

    #[tokio::test]
    async fn test_cortex_trait_forwards_to_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 2);

        let shared: Arc<dyn CortexEventBus> = Arc::new(event_bus.clone());
        shared
            .publish(CortexEvent::HistoryAnalyzed {
                turns_analyzed: 3,
                keywords_added: 2,
                timestamp: Utc::now(),
            })
            .await
            .unwrap();

        for receiver in [&mut receiver1, &mut receiver2] {
            let event = receiver.recv().await.unwrap();
            assert_eq!(event.event_type(), "history_analyzed");
        }
    }

    #[test]
    fn test_try_recv_empty() {
        let event_bus = EventBus::default();
        let mut receiver = event_bus.subscribe();
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }
}
