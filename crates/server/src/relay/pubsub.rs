//! Topic-keyed broadcast bus

use std::collections::HashMap;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

/// In-process publish/subscribe bus, one broadcast channel per topic.
///
/// Owned by whoever needs it (the relay in production, each test in tests),
/// so there is no process-wide state.
pub struct PubSub<T> {
    channels: RwLock<HashMap<String, broadcast::Sender<T>>>,
    capacity: usize,
}

impl<T: Clone + Send + 'static> PubSub<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    async fn sender(&self, topic: &str) -> broadcast::Sender<T> {
        if let Some(tx) = self.channels.read().await.get(topic) {
            return tx.clone();
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Append an event to `topic`, returns how many subscribers got it.
    /// No subscribers is fine.
    pub async fn publish(&self, topic: &str, event: T) -> usize {
        let tx = self.sender(topic).await;
        match tx.send(event) {
            Ok(count) => count,
            Err(_) => {
                debug!("[Relay] No subscribers on {}", topic);
                0
            }
        }
    }

    /// Events on `topic` accepted by `predicate`, from now on.
    ///
    /// The receiver is registered before this returns, so nothing published
    /// afterwards is missed (lag aside).
    pub async fn subscribe<F>(&self, topic: &str, predicate: F) -> BoxStream<'static, T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let mut rx = self.sender(topic).await.subscribe();
        let topic = topic.to_string();

        let stream = async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if predicate(&event) {
                            yield event;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("[Relay] Subscriber on {} lagged, skipped {} events", topic, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("[Relay] Channel {} closed", topic);
                        break;
                    }
                }
            }
        };

        stream.boxed()
    }

    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.channels
            .read()
            .await
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}
