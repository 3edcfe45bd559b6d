// Subscriber membership and snapshot fan-out with per-subscriber failure
// isolation.

use axum::extract::ws::Utf8Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc};
use tracing::warn;

/// Identifier handed out on registration; unique for the process lifetime.
pub type SubscriberId = u64;

/// Thread-safe set of active subscriber outboxes.
///
/// Registration is not deduplicated: every `register` call creates a fresh
/// entry, and pairing an entry with exactly one connection is the caller's
/// job. Delivery goes through unbounded per-subscriber channels so one slow
/// consumer never blocks the broadcast pass.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<SubscriberId, mpsc::UnboundedSender<Utf8Bytes>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an outbox and returns the id to unregister it with later.
    pub async fn register(&self, outbox: mpsc::UnboundedSender<Utf8Bytes>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().await.insert(id, outbox);
        id
    }

    /// Removes a subscriber if present. Absent ids are a no-op, so cleanup
    /// paths may call this even after a broadcast already pruned the entry.
    pub async fn unregister(&self, id: SubscriberId) {
        self.subscribers.write().await.remove(&id);
    }

    pub async fn count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Delivers `payload` to every registered subscriber.
    ///
    /// Two-phase: membership is copied under the read lock, sends happen
    /// with no lock held, and failed entries are pruned under the write lock
    /// afterwards. A dead subscriber never aborts delivery to the rest, and
    /// the caller never sees per-subscriber errors.
    pub async fn broadcast(&self, payload: Utf8Bytes) {
        let members: Vec<(SubscriberId, mpsc::UnboundedSender<Utf8Bytes>)> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .iter()
                .map(|(id, outbox)| (*id, outbox.clone()))
                .collect()
        };

        let mut dead = Vec::new();
        for (id, outbox) in members {
            if outbox.send(payload.clone()).is_err() {
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in dead {
                if subscribers.remove(&id).is_some() {
                    warn!(subscriber_id = id, "pruned unreachable subscriber");
                }
            }
        }
    }
}
