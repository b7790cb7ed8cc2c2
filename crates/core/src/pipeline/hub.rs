use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use structscope_api::Outbound;
use tokio::sync::mpsc::{self, error::TrySendError};

pub type ClientId = u64;

/// Fan-out of outbound messages to connected observers.
///
/// Each observer owns a bounded queue. Publishing never waits: an observer
/// whose queue is full or closed is dropped, which closes its receiver.
#[derive(Default)]
pub struct Hub {
    clients: DashMap<ClientId, mpsc::Sender<Outbound>>,
    next_id: AtomicU64,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, capacity: usize) -> (ClientId, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.clients.insert(id, tx);
        tracing::debug!("Observer {} registered ({} connected)", id, self.clients.len());
        (id, rx)
    }

    pub fn unregister(&self, id: ClientId) {
        if self.clients.remove(&id).is_some() {
            tracing::debug!("Observer {} unregistered", id);
        }
    }

    /// Queues `message` for every observer. Returns how many received it.
    pub fn publish(&self, message: Outbound) -> usize {
        let mut delivered = 0;
        let mut dropped = Vec::new();
        for entry in self.clients.iter() {
            match entry.value().try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => dropped.push((*entry.key(), reason(&err))),
            }
        }
        // Removing while iterating would deadlock on the shard lock.
        for (id, why) in dropped {
            tracing::warn!("Dropping observer {}: {}", id, why);
            self.clients.remove(&id);
        }
        delivered
    }

    /// Queues `message` for one observer, dropping it on a full queue.
    pub fn send_to(&self, id: ClientId, message: Outbound) -> bool {
        let result = match self.clients.get(&id) {
            Some(tx) => tx.try_send(message),
            None => return false,
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("Dropping observer {}: {}", id, reason(&err));
                self.clients.remove(&id);
                false
            }
        }
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    /// Drops every sender so writer tasks drain and exit.
    pub fn close_all(&self) {
        self.clients.clear();
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

fn reason<T>(err: &TrySendError<T>) -> &'static str {
    match err {
        TrySendError::Full(_) => "outbound queue full",
        TrySendError::Closed(_) => "connection closed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_everyone() {
        let hub = Hub::new();
        let (_, mut a) = hub.register(4);
        let (_, mut b) = hub.register(4);

        assert_eq!(hub.publish(Outbound::clear()), 2);
        assert!(matches!(a.recv().await, Some(Outbound::Clear { .. })));
        assert!(matches!(b.recv().await, Some(Outbound::Clear { .. })));
    }

    #[tokio::test]
    async fn test_full_queue_drops_only_that_observer() {
        let hub = Hub::new();
        let (slow, mut slow_rx) = hub.register(1);
        let (fast, mut fast_rx) = hub.register(4);

        assert_eq!(hub.publish(Outbound::clear()), 2);
        let _ = fast_rx.recv().await;
        assert_eq!(hub.publish(Outbound::error("second")), 1);

        assert!(!hub.contains(slow));
        assert!(hub.contains(fast));
        assert!(matches!(fast_rx.recv().await, Some(Outbound::Error { .. })));
        // The queued message is still delivered, then the queue closes.
        assert!(slow_rx.recv().await.is_some());
        assert!(slow_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_receiver_is_dropped() {
        let hub = Hub::new();
        let (id, rx) = hub.register(4);
        drop(rx);
        assert!(!hub.send_to(id, Outbound::clear()));
        assert!(hub.is_empty());
    }

    #[tokio::test]
    async fn test_close_all_ends_receivers() {
        let hub = Hub::new();
        let (_, mut rx) = hub.register(4);
        hub.close_all();
        assert!(rx.recv().await.is_none());
    }
}
