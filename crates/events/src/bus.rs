//! Event bus for pub/sub coordination.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::error::{Error, Result};
use crate::event::TaskEvent;
use crate::types::TaskId;

/// Default capacity of the broadcast channel backing the bus.
const BROADCAST_CAPACITY: usize = 1000;

/// Circuit breaker to stop delivering to persistently failing subscribers.
pub struct CircuitBreaker {
    failure_count: AtomicU32,
    threshold: u32,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given failure threshold.
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            failure_count: AtomicU32::new(0),
            threshold,
        }
    }

    /// Check if a delivery should be attempted.
    pub fn allow_request(&self) -> bool {
        self.failure_count.load(Ordering::Relaxed) < self.threshold
    }

    /// Record a successful delivery.
    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
    }

    /// Record a failed delivery.
    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current failure count.
    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Relaxed)
    }
}

/// Pattern-filtered subscriber entry.
struct Subscriber {
    sender: broadcast::Sender<TaskEvent>,
    pattern: EventPattern,
    breaker: Arc<CircuitBreaker>,
}

/// Subscription handle for receiving events.
pub struct EventSubscription {
    receiver: broadcast::Receiver<TaskEvent>,
}

impl EventSubscription {
    /// Receive the next event.
    pub async fn recv(&mut self) -> Result<TaskEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Err(Error::ChannelClosed),
            }
        }
    }

    /// Try to receive an event without waiting.
    pub fn try_recv(&mut self) -> Result<TaskEvent> {
        use broadcast::error::TryRecvError;
        self.receiver.try_recv().map_err(|e| match e {
            TryRecvError::Lagged(n) => Error::Lagged(n),
            TryRecvError::Empty | TryRecvError::Closed => Error::ChannelClosed,
        })
    }
}

/// Pattern for filtering events.
#[derive(Debug, Clone)]
pub enum EventPattern {
    /// Match all events.
    All,
    /// Match events by type.
    ByType(String),
    /// Match events by task ID.
    ByTask(TaskId),
    /// Match events by multiple types.
    ByTypes(Vec<String>),
}

impl EventPattern {
    /// Check if an event matches this pattern.
    #[must_use]
    pub fn matches(&self, event: &TaskEvent) -> bool {
        match self {
            Self::All => true,
            Self::ByType(t) => event.event_type() == t,
            Self::ByTask(id) => event.task_id() == Some(id),
            Self::ByTypes(types) => types.iter().any(|t| event.event_type() == t),
        }
    }
}

/// Event bus for publishing and subscribing to task events.
pub struct EventBus {
    /// Broadcast sender for all events.
    broadcast: broadcast::Sender<TaskEvent>,
    /// Pattern-based subscribers.
    subscribers: RwLock<HashMap<String, Subscriber>>,
    /// Next subscriber ID.
    next_id: RwLock<u64>,
    /// Failure threshold for circuit breakers.
    failure_threshold: u32,
}

impl EventBus {
    /// Create a new event bus.
    #[must_use]
    pub fn new() -> Self {
        let (broadcast, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            broadcast,
            subscribers: RwLock::new(HashMap::new()),
            next_id: RwLock::new(0),
            failure_threshold: 5,
        }
    }

    /// Publish an event to all subscribers.
    ///
    /// Delivery is best-effort: subscribers with no live receiver are
    /// skipped and eventually evicted by their circuit breaker.
    pub async fn publish(&self, event: TaskEvent) {
        debug!(event_type = event.event_type(), "publishing event");

        // Firehose channel: ignore "no receivers" errors.
        let _ = self.broadcast.send(event.clone());

        let subscribers = self.subscribers.read().await;
        for (id, sub) in subscribers.iter() {
            if !sub.pattern.matches(&event) {
                continue;
            }
            if !sub.breaker.allow_request() {
                debug!(subscriber = %id, "circuit open, skipping delivery");
                continue;
            }
            match sub.sender.send(event.clone()) {
                Ok(_) => sub.breaker.record_success(),
                Err(_) => sub.breaker.record_failure(),
            }
        }
    }

    /// Subscribe to all events.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.broadcast.subscribe(),
        }
    }

    /// Subscribe with a filter pattern. Returns the subscription id
    /// (usable for unsubscribing) and the subscription handle.
    pub async fn subscribe_with_pattern(&self, pattern: EventPattern) -> (String, EventSubscription) {
        let (sender, receiver) = broadcast::channel(BROADCAST_CAPACITY);

        let id = {
            let mut next = self.next_id.write().await;
            let id = format!("sub-{}", *next);
            *next = next.saturating_add(1);
            id
        };

        let subscriber = Subscriber {
            sender,
            pattern,
            breaker: Arc::new(CircuitBreaker::new(self.failure_threshold)),
        };
        self.subscribers.write().await.insert(id.clone(), subscriber);

        (id, EventSubscription { receiver })
    }

    /// Remove a pattern subscription.
    pub async fn unsubscribe(&self, id: &str) -> bool {
        self.subscribers.write().await.remove(id).is_some()
    }

    /// Number of active pattern subscriptions.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
