use crate::{error::BusError, topic::topic_matches};
use futures::Stream;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    marker::PhantomData,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::trace;

/// Backpressure capacity for each subscriber's mailbox. Publish blocks at
/// its await point once a slow subscriber's mailbox is full — no drop
/// policy is applied on the hot path (spec §5, Backpressure).
const SUBSCRIBER_CAPACITY: usize = 1_024;

struct Subscriber {
    pattern: String,
    tx: mpsc::Sender<(String, Vec<u8>)>,
}

#[derive(Default)]
struct Registry {
    subscribers: Vec<Subscriber>,
}

/// Typed pub/sub bus over topic strings (spec §4.C). Cloning a [`Bus`]
/// shares the same topic routing table — it is the cheap handle every
/// component holds.
#[derive(Clone, Default)]
pub struct Bus {
    registry: Arc<Mutex<Registry>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a topic pattern (a single `*` matches one `.`-delimited
    /// segment). Returns a lazy stream of deserialized payloads.
    pub fn subscribe<T>(&self, pattern: impl Into<String>) -> BusSubscription<T>
    where
        T: DeserializeOwned,
    {
        let pattern = pattern.into();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.registry.lock().subscribers.push(Subscriber {
            pattern: pattern.clone(),
            tx,
        });
        BusSubscription {
            pattern,
            inner: ReceiverStream::new(rx),
            _marker: PhantomData,
        }
    }

    /// Publish a single payload to `topic`. Awaits delivery into every
    /// matching subscriber's mailbox in subscription-registration order,
    /// which preserves per-topic, per-publisher FIFO (spec §5).
    pub async fn publish<T>(&self, topic: &str, payload: &T) -> Result<(), BusError>
    where
        T: Serialize,
    {
        let bytes = serde_json::to_vec(payload).map_err(|source| BusError::Serialize {
            topic: topic.to_string(),
            source,
        })?;

        let matching: Vec<mpsc::Sender<(String, Vec<u8>)>> = {
            let registry = self.registry.lock();
            registry
                .subscribers
                .iter()
                .filter(|s| topic_matches(&s.pattern, topic))
                .map(|s| s.tx.clone())
                .collect()
        };

        for tx in matching {
            if tx.send((topic.to_string(), bytes.clone())).await.is_err() {
                trace!(topic, "subscriber dropped before delivery");
            }
        }
        Ok(())
    }

    /// Publish a batch of payloads to `topic`. Equivalent to sequential
    /// `publish` calls, but ordering within the batch is guaranteed (spec
    /// §4.C) because each publish is awaited before the next begins.
    pub async fn publish_batch<T>(&self, topic: &str, payloads: &[T]) -> Result<(), BusError>
    where
        T: Serialize,
    {
        for payload in payloads {
            self.publish(topic, payload).await?;
        }
        Ok(())
    }
}

/// A live subscription to a topic pattern; implements [`Stream`] yielding
/// deserialized `T`s in arrival order.
pub struct BusSubscription<T> {
    pattern: String,
    inner: ReceiverStream<(String, Vec<u8>)>,
    _marker: PhantomData<T>,
}

impl<T> BusSubscription<T> {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl<T> Stream for BusSubscription<T>
where
    T: DeserializeOwned + Unpin,
{
    type Item = Result<T, BusError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some((topic, bytes))) => {
                let parsed = serde_json::from_slice(&bytes).map_err(|source| {
                    BusError::Deserialize { topic, source }
                });
                Poll::Ready(Some(parsed))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
