// EventBus: publish/subscribe with bounded replay history.
//
// Dispatch is per-subscriber: each subscriber owns a bounded mpsc channel: a
// slow subscriber drops its own overflow rather than blocking emit() or
// other subscribers.

use agentrt_contracts::events::{Event, EventFilter};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::warn;

const DEFAULT_HISTORY_SIZE: usize = 1000;
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

struct Subscriber {
    handle: SubscriptionHandle,
    filter: Option<EventFilter>,
    sender: mpsc::Sender<Event>,
}

/// In-process event bus. `emit` is synchronous and non-blocking: it fans
/// out by pushing into each subscriber's bounded channel, dropping on a
/// full channel rather than waiting.
pub struct EventBus {
    history: RwLock<VecDeque<Event>>,
    history_limit: usize,
    subscribers: RwLock<Vec<Subscriber>>,
    next_handle: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_SIZE)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            history: RwLock::new(VecDeque::with_capacity(history_limit.min(1024))),
            history_limit,
            subscribers: RwLock::new(Vec::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Publish an event. Subscribers are notified in registration order;
    /// a full subscriber channel is logged and dropped, never awaited.
    pub async fn emit(&self, event: Event) {
        {
            let mut history = self.history.write().await;
            if history.len() >= self.history_limit {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        let subscribers = self.subscribers.read().await;
        for sub in subscribers.iter() {
            if let Some(filter) = &sub.filter {
                if !filter.matches(&event) {
                    continue;
                }
            }
            if sub.sender.try_send(event.clone()).is_err() {
                warn!(
                    event_type = %event.event_type,
                    "event subscriber channel full or closed, dropping event"
                );
            }
        }
    }

    /// Subscribe to all events. Returns a handle and a receiver; the
    /// caller drives delivery by polling the receiver.
    pub async fn subscribe(&self) -> (SubscriptionHandle, mpsc::Receiver<Event>) {
        self.subscribe_filtered(None).await
    }

    pub async fn subscribe_filtered(
        &self,
        filter: Option<EventFilter>,
    ) -> (SubscriptionHandle, mpsc::Receiver<Event>) {
        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        self.subscribers.write().await.push(Subscriber {
            handle,
            filter,
            sender: tx,
        });
        (handle, rx)
    }

    pub async fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.subscribers.write().await.retain(|s| s.handle != handle);
    }

    /// Replay history, optionally filtered, newest-last, up to `limit`.
    pub async fn history(&self, filter: Option<&EventFilter>, limit: usize) -> Vec<Event> {
        let history = self.history.read().await;
        let matched: Vec<Event> = history
            .iter()
            .filter(|e| filter.map(|f| f.matches(e)).unwrap_or(true))
            .cloned()
            .collect();
        let start = matched.len().saturating_sub(limit);
        matched[start..].to_vec()
    }

    pub async fn clear_history(&self) {
        self.history.write().await.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrt_contracts::events::EventMetadata;
    use uuid::Uuid;

    fn sample_event(agent_id: Uuid, event_type: &str) -> Event {
        Event::new(
            event_type,
            serde_json::json!({}),
            EventMetadata {
                agent_id,
                session_id: None,
                execution_id: None,
                user_id: None,
            },
        )
    }

    #[tokio::test]
    async fn history_evicts_fifo_beyond_limit() {
        let bus = EventBus::with_history_limit(2);
        let agent_id = Uuid::now_v7();
        bus.emit(sample_event(agent_id, "a")).await;
        bus.emit(sample_event(agent_id, "b")).await;
        bus.emit(sample_event(agent_id, "c")).await;

        let history = bus.history(None, 10).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].event_type, "b");
        assert_eq!(history[1].event_type, "c");
    }

    #[tokio::test]
    async fn subscribers_receive_in_order_and_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let agent_id = Uuid::now_v7();
        let (handle, mut rx) = bus.subscribe().await;

        bus.emit(sample_event(agent_id, "first")).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, "first");

        bus.unsubscribe(handle).await;
        bus.emit(sample_event(agent_id, "second")).await;
        assert!(rx.recv().await.is_none() || rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn filtered_subscription_only_sees_matching_agent() {
        let bus = EventBus::new();
        let target = Uuid::now_v7();
        let other = Uuid::now_v7();
        let (_h, mut rx) = bus
            .subscribe_filtered(Some(EventFilter {
                agent_id: Some(target),
                session_id: None,
            }))
            .await;

        bus.emit(sample_event(other, "ignored")).await;
        bus.emit(sample_event(target, "kept")).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, "kept");
    }
}
