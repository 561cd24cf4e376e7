//! Event Bus
//!
//! In-process publish/subscribe with asynchronous dispatch and per-subscriber
//! isolation. Events are buffered transaction-locally and only reach the bus
//! after the owning transaction commits; a rolled-back transaction publishes
//! nothing.
//!
//! Dispatch runs on a bounded pool: `core` permanent workers drain a bounded
//! queue, up to `max - core` surge tasks absorb bursts, and when both are
//! exhausted the job runs synchronously on the publishing task so that a
//! committed event is never dropped. A failing or slow subscriber is logged
//! with the trace id and never affects other subscribers or the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, Semaphore};

use crate::domain::{EventKind, ExpenseEvent};

/// Failure raised by a subscriber. Logged, never propagated to the caller.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SubscriberError {
    message: String,
}

impl SubscriberError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A subscriber handles the event kinds it registers interest in.
#[async_trait]
pub trait Subscriber: Send + Sync {
    fn name(&self) -> &'static str;

    /// Event kinds this subscriber wants, matched exactly.
    fn interests(&self) -> &'static [EventKind];

    async fn handle(&self, event: &ExpenseEvent) -> Result<(), SubscriberError>;
}

/// Worker pool parameters.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Permanent workers draining the queue
    pub core_workers: usize,
    /// Upper bound including surge tasks
    pub max_workers: usize,
    /// Bounded queue capacity; a full queue falls back to inline dispatch
    pub queue_capacity: usize,
    /// Per-job deadline; exceeding it counts as subscriber failure
    pub task_timeout: Duration,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            core_workers: 5,
            max_workers: 10,
            queue_capacity: 100,
            task_timeout: Duration::from_secs(5),
        }
    }
}

struct Job {
    event: Arc<ExpenseEvent>,
    subscriber: Arc<dyn Subscriber>,
}

struct BusInner {
    subscribers: Vec<Arc<dyn Subscriber>>,
    queue: mpsc::Sender<Job>,
    surge: Arc<Semaphore>,
    task_timeout: Duration,
}

/// Handle to the running bus. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn builder(config: EventBusConfig) -> EventBusBuilder {
        EventBusBuilder {
            config,
            subscribers: Vec::new(),
        }
    }

    /// Offer a committed event to every interested subscriber.
    ///
    /// Returns as soon as each job is enqueued; only under saturation does
    /// the publishing task execute a job itself.
    pub async fn publish(&self, event: ExpenseEvent) {
        let event = Arc::new(event);
        let kind = event.kind();

        for subscriber in &self.inner.subscribers {
            if !subscriber.interests().contains(&kind) {
                continue;
            }

            let job = Job {
                event: Arc::clone(&event),
                subscriber: Arc::clone(subscriber),
            };

            match self.inner.queue.try_send(job) {
                Ok(()) => {}
                Err(TrySendError::Full(job)) => {
                    if let Ok(permit) = Arc::clone(&self.inner.surge).try_acquire_owned() {
                        let timeout = self.inner.task_timeout;
                        tokio::spawn(async move {
                            run_job(job, timeout).await;
                            drop(permit);
                        });
                    } else {
                        tracing::warn!(
                            event_type = event.event_type(),
                            trace_id = event.trace_id(),
                            "event queue saturated, dispatching on publisher"
                        );
                        run_job(job, self.inner.task_timeout).await;
                    }
                }
                Err(TrySendError::Closed(job)) => {
                    // Workers are gone (shutdown); still honor the delivery
                    run_job(job, self.inner.task_timeout).await;
                }
            }
        }
    }
}

pub struct EventBusBuilder {
    config: EventBusConfig,
    subscribers: Vec<Arc<dyn Subscriber>>,
}

impl EventBusBuilder {
    pub fn subscribe(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Spawn the core workers and hand back the bus.
    pub fn build(self) -> EventBus {
        let (tx, rx) = mpsc::channel::<Job>(self.config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let surge_permits = self.config.max_workers.saturating_sub(self.config.core_workers);

        for worker in 0..self.config.core_workers.max(1) {
            let rx = Arc::clone(&rx);
            let timeout = self.config.task_timeout;
            tokio::spawn(async move {
                tracing::debug!(worker, "event worker started");
                loop {
                    let job = rx.lock().await.recv().await;
                    match job {
                        Some(job) => run_job(job, timeout).await,
                        None => break,
                    }
                }
                tracing::debug!(worker, "event worker stopped");
            });
        }

        EventBus {
            inner: Arc::new(BusInner {
                subscribers: self.subscribers,
                queue: tx,
                surge: Arc::new(Semaphore::new(surge_permits)),
                task_timeout: self.config.task_timeout,
            }),
        }
    }
}

async fn run_job(job: Job, task_timeout: Duration) {
    let Job { event, subscriber } = job;

    match tokio::time::timeout(task_timeout, subscriber.handle(&event)).await {
        Ok(Ok(())) => {
            tracing::debug!(
                subscriber = subscriber.name(),
                event_type = event.event_type(),
                expense_id = event.expense_id(),
                trace_id = event.trace_id(),
                "event handled"
            );
        }
        Ok(Err(e)) => {
            tracing::warn!(
                subscriber = subscriber.name(),
                event_type = event.event_type(),
                expense_id = event.expense_id(),
                trace_id = event.trace_id(),
                error = %e,
                "subscriber failed"
            );
        }
        Err(_) => {
            tracing::warn!(
                subscriber = subscriber.name(),
                event_type = event.event_type(),
                expense_id = event.expense_id(),
                trace_id = event.trace_id(),
                timeout_ms = task_timeout.as_millis() as u64,
                "subscriber timed out"
            );
        }
    }
}

/// Transaction-local event buffer.
///
/// Lifecycle handlers record into the buffer while the transaction is open
/// and flush only after a successful commit. Dropping the buffer discards
/// the events, which is exactly what a rollback needs.
#[derive(Default)]
pub struct EventBuffer {
    events: Vec<ExpenseEvent>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: ExpenseEvent) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Publish the buffered events in commit order.
    pub async fn flush(self, bus: &EventBus) {
        for event in self.events {
            bus.publish(event).await;
        }
    }
}
