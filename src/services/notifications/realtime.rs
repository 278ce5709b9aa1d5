//! Registry of live websocket connections keyed by user id.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::provider::RealtimeEvent;

/// Handle returned by [`RealtimeHub::subscribe`]; drop it (or the receiver)
/// and the connection is pruned on the next push.
pub struct Subscription {
    pub id: u64,
    pub user_id: i32,
    pub events: mpsc::UnboundedReceiver<RealtimeEvent>,
}

#[derive(Clone, Default)]
pub struct RealtimeHub {
    connections: Arc<DashMap<i32, Vec<(u64, mpsc::UnboundedSender<RealtimeEvent>)>>>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for RealtimeHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeHub")
            .field("users", &self.connections.len())
            .finish()
    }
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, user_id: i32) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections.entry(user_id).or_default().push((id, tx));
        tracing::debug!(user_id, connection_id = id, "Realtime connection registered");

        Subscription {
            id,
            user_id,
            events: rx,
        }
    }

    pub fn unsubscribe(&self, user_id: i32, connection_id: u64) {
        if let Some(mut senders) = self.connections.get_mut(&user_id) {
            senders.retain(|(id, _)| *id != connection_id);
        }
        self.connections.remove_if(&user_id, |_, senders| senders.is_empty());
    }

    /// Fans `event` out to every open connection of `user_id`; returns how
    /// many received it. Closed connections are dropped.
    pub fn push(&self, user_id: i32, event: &RealtimeEvent) -> usize {
        let delivered = match self.connections.get_mut(&user_id) {
            Some(mut senders) => {
                senders.retain(|(_, tx)| tx.send(event.clone()).is_ok());
                senders.len()
            }
            None => return 0,
        };
        if delivered == 0 {
            self.connections.remove_if(&user_id, |_, senders| senders.is_empty());
        }
        delivered
    }

    pub fn connection_count(&self, user_id: i32) -> usize {
        self.connections
            .get(&user_id)
            .map(|senders| senders.len())
            .unwrap_or(0)
    }
}
