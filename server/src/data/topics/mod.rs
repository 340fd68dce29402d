//! In-process ingest topics
//!
//! One unbounded queue per telemetry kind. Producers never block and never
//! see backpressure; a single consumer drains the queue in batches.
//!
//! Queued items live in memory only and are lost on restart.

mod error;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

pub use error::TopicError;

// ============================================================================
// TOPIC MESSAGE TRAIT
// ============================================================================

/// Trait for messages that can be published to topics
pub trait TopicMessage: Send + Sync + 'static {
    /// Number of leaf records carried, for logging
    fn record_count(&self) -> usize;
}

// ============================================================================
// READ BATCH POLICY
// ============================================================================

/// How long a batch read keeps waiting for a short batch to fill up
#[derive(Debug, Clone, Copy)]
pub struct ReadGrace {
    pub attempts: u32,
    pub delay: Duration,
}

impl ReadGrace {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}

// ============================================================================
// PUBLISHER / SUBSCRIBER
// ============================================================================

/// Publisher handle - clone and share across producers
#[derive(Debug)]
pub struct Publisher<T: TopicMessage> {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<T>,
}

impl<T: TopicMessage> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            tx: self.tx.clone(),
        }
    }
}

impl<T: TopicMessage> Publisher<T> {
    /// Enqueue a message; fails only when the consumer is gone
    pub fn publish(&self, msg: T) -> Result<(), TopicError> {
        let records = msg.record_count();
        self.tx.send(msg).map_err(|_| TopicError::ChannelClosed)?;
        tracing::trace!(topic = %self.name, records, "Published message");
        Ok(())
    }
}

/// The single consumer of a topic
pub struct Subscriber<T: TopicMessage> {
    rx: mpsc::UnboundedReceiver<T>,
    /// Messages dequeued by a read that has not returned yet
    pending: Vec<T>,
}

impl<T: TopicMessage> Subscriber<T> {
    fn new(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self {
            rx,
            pending: Vec::new(),
        }
    }

    /// Read up to `max` messages.
    ///
    /// Waits for the first message, then drains without blocking. A short
    /// batch gets `grace.attempts` sleeps of `grace.delay`, draining after
    /// each, before being returned. Returns `None` once the topic is closed
    /// and empty.
    ///
    /// Cancel safe: messages dequeued by a dropped read are returned by the
    /// next read.
    pub async fn read_batch(&mut self, max: usize, grace: ReadGrace) -> Option<Vec<T>> {
        let max = max.max(1);
        if self.pending.is_empty() {
            let first = self.rx.recv().await?;
            self.pending.push(first);
        }
        self.fill_pending(max);

        let mut remaining = grace.attempts;
        while self.pending.len() < max && remaining > 0 {
            tokio::time::sleep(grace.delay).await;
            remaining -= 1;
            self.fill_pending(max);
        }
        Some(self.take_pending(max))
    }

    /// Non-blocking read of whatever is pending or queued, up to `max`
    pub fn try_read_batch(&mut self, max: usize) -> Vec<T> {
        let max = max.max(1);
        self.fill_pending(max);
        self.take_pending(max)
    }

    fn fill_pending(&mut self, max: usize) {
        while self.pending.len() < max {
            match self.rx.try_recv() {
                Ok(msg) => self.pending.push(msg),
                Err(_) => break,
            }
        }
    }

    fn take_pending(&mut self, max: usize) -> Vec<T> {
        let rest = self.pending.split_off(max.min(self.pending.len()));
        std::mem::replace(&mut self.pending, rest)
    }
}

// ============================================================================
// TOPIC
// ============================================================================

/// Handle to a named topic
pub struct Topic<T: TopicMessage> {
    name: Arc<str>,
    publisher: Publisher<T>,
    receiver: Arc<Mutex<Option<mpsc::UnboundedReceiver<T>>>>,
}

impl<T: TopicMessage> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            publisher: self.publisher.clone(),
            receiver: Arc::clone(&self.receiver),
        }
    }
}

impl<T: TopicMessage> Topic<T> {
    fn new(name: &str) -> Self {
        let name: Arc<str> = Arc::from(name);
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            publisher: Publisher {
                name: Arc::clone(&name),
                tx,
            },
            receiver: Arc::new(Mutex::new(Some(rx))),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn publisher(&self) -> Publisher<T> {
        self.publisher.clone()
    }

    /// Take the single consumer of this topic
    pub fn subscribe(&self) -> Result<Subscriber<T>, TopicError> {
        self.receiver
            .lock()
            .take()
            .map(Subscriber::new)
            .ok_or_else(|| TopicError::AlreadySubscribed(self.name.to_string()))
    }
}

// ============================================================================
// TOPIC SERVICE
// ============================================================================

type TopicMap = HashMap<String, (TypeId, Arc<dyn Any + Send + Sync>)>;

/// Registry of named topics
#[derive(Default)]
pub struct TopicService {
    topics: RwLock<TopicMap>,
}

impl TopicService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a topic or get the existing one with the same message type
    pub fn topic<T: TopicMessage>(&self, name: &str) -> Result<Topic<T>, TopicError> {
        let type_id = TypeId::of::<T>();
        let mut topics = self.topics.write();

        if let Some((existing_type, topic)) = topics.get(name) {
            if *existing_type != type_id {
                return Err(TopicError::TypeMismatch(name.to_string()));
            }
            return topic
                .downcast_ref::<Topic<T>>()
                .cloned()
                .ok_or_else(|| TopicError::TypeMismatch(name.to_string()));
        }

        let topic = Topic::<T>::new(name);
        topics.insert(name.to_string(), (type_id, Arc::new(topic.clone())));
        Ok(topic)
    }
}
