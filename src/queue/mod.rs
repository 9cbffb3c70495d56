//! Queue client abstraction — the capability surface the engine needs from a
//! message-queue transport.
//!
//! The transfer components never talk to a broker directly; they go through
//! [`QueueClient`], which captures exactly the operations the engine relies
//! on: existence check, snapshot of currently available messages, plain and
//! transactional send, and removal by message id. Any transport that can
//! provide these can sit behind the engine.
//!
//! [`InMemoryQueue`] is the bundled implementation: a thread-safe, in-process
//! multi-queue store used by the test suite and by embedders who want the
//! engine without a broker. It supports fault injection so send failures can
//! be exercised deterministically.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Errors produced by queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue `{queue}` does not exist")]
    NotFound { queue: String },

    #[error("message `{id}` not found in queue `{queue}`")]
    MessageNotFound { queue: String, id: String },

    #[error("send to queue `{queue}` rejected: {reason}")]
    SendRejected { queue: String, reason: String },

    #[error("queue transport error: {0}")]
    Transport(String),
}

/// One message as observed in a queue snapshot.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Transport-assigned message identity, used for removal.
    pub id: String,
    /// Human-meaningful label attached at send time.
    pub label: String,
    /// Raw payload bytes.
    pub body: Bytes,
    /// When the message arrived in the queue.
    pub arrived_at: DateTime<Local>,
}

/// The queue capabilities the transfer engine requires.
///
/// All methods take the queue address as a plain string; address syntax is a
/// transport concern. Implementations must be safe for concurrent use — the
/// scheduler shares one client across all tasks.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Returns `true` if `queue` exists and is accessible.
    ///
    /// The engine never creates queues; a missing queue is an environment
    /// error reported by the caller.
    async fn exists(&self, queue: &str) -> bool;

    /// Returns all currently available messages, in arrival order.
    ///
    /// This is a snapshot: messages that arrive afterwards belong to a later
    /// invocation.
    async fn snapshot(&self, queue: &str) -> Result<Vec<QueueMessage>, QueueError>;

    /// Appends a message carrying `label` and `body` to `queue`.
    async fn send(&self, queue: &str, label: &str, body: Bytes) -> Result<(), QueueError>;

    /// Sends wrapped in a queue transaction: begin, send, commit as one
    /// atomic unit. On any failure the whole send is abandoned and the
    /// message is never observable.
    async fn send_transactional(
        &self,
        queue: &str,
        label: &str,
        body: Bytes,
    ) -> Result<(), QueueError>;

    /// Removes the message with the given id from `queue`.
    async fn remove(&self, queue: &str, id: &str) -> Result<(), QueueError>;
}

// Per-queue storage plus an optional send-failure budget for fault injection.
#[derive(Debug, Default)]
struct QueueState {
    messages: VecDeque<QueueMessage>,
    // `Some(n)`: the next n sends succeed, then sends fail until cleared.
    send_budget: Option<usize>,
}

/// An in-process, thread-safe queue store implementing [`QueueClient`].
///
/// Queues must be created explicitly with [`create_queue`] before use,
/// mirroring transports where queue provisioning is an administrative step.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use mqbridge::queue::{InMemoryQueue, QueueClient};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let queue = InMemoryQueue::new();
/// queue.create_queue("orders").await;
/// queue.send("orders", "order-1", Bytes::from_static(b"<order/>")).await.unwrap();
///
/// let messages = queue.snapshot("orders").await.unwrap();
/// assert_eq!(messages.len(), 1);
/// assert_eq!(messages[0].label, "order-1");
/// # }
/// ```
///
/// [`create_queue`]: InMemoryQueue::create_queue
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, QueueState>>,
}

impl InMemoryQueue {
    /// Creates an empty store with no queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `queue` if it does not already exist.
    pub async fn create_queue(&self, queue: &str) {
        self.queues
            .lock()
            .await
            .entry(queue.to_owned())
            .or_default();
    }

    /// Returns the number of messages currently in `queue`.
    pub async fn len(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .await
            .get(queue)
            .map_or(0, |state| state.messages.len())
    }

    /// Returns `true` if `queue` holds no messages (or does not exist).
    pub async fn is_empty(&self, queue: &str) -> bool {
        self.len(queue).await == 0
    }

    /// Fault injection: allows `successes` more sends to `queue`, after which
    /// every send fails with [`QueueError::SendRejected`] until the budget is
    /// reset by another call.
    pub async fn fail_sends_after(&self, queue: &str, successes: usize) {
        if let Some(state) = self.queues.lock().await.get_mut(queue) {
            state.send_budget = Some(successes);
        }
    }

    async fn push(
        &self,
        queue: &str,
        label: &str,
        body: Bytes,
    ) -> Result<(), QueueError> {
        let mut queues = self.queues.lock().await;
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| QueueError::NotFound {
                queue: queue.to_owned(),
            })?;

        if let Some(budget) = state.send_budget.as_mut() {
            if *budget == 0 {
                return Err(QueueError::SendRejected {
                    queue: queue.to_owned(),
                    reason: "injected send failure".to_owned(),
                });
            }
            *budget -= 1;
        }

        state.messages.push_back(QueueMessage {
            id: Uuid::new_v4().to_string(),
            label: label.to_owned(),
            body,
            arrived_at: Local::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl QueueClient for InMemoryQueue {
    async fn exists(&self, queue: &str) -> bool {
        self.queues.lock().await.contains_key(queue)
    }

    async fn snapshot(&self, queue: &str) -> Result<Vec<QueueMessage>, QueueError> {
        let queues = self.queues.lock().await;
        let state = queues.get(queue).ok_or_else(|| QueueError::NotFound {
            queue: queue.to_owned(),
        })?;
        Ok(state.messages.iter().cloned().collect())
    }

    async fn send(&self, queue: &str, label: &str, body: Bytes) -> Result<(), QueueError> {
        self.push(queue, label, body).await
    }

    async fn send_transactional(
        &self,
        queue: &str,
        label: &str,
        body: Bytes,
    ) -> Result<(), QueueError> {
        // The store mutex already makes the append atomic; a failed push
        // leaves nothing observable, which is exactly the commit contract.
        self.push(queue, label, body).await
    }

    async fn remove(&self, queue: &str, id: &str) -> Result<(), QueueError> {
        let mut queues = self.queues.lock().await;
        let state = queues.get_mut(queue).ok_or_else(|| QueueError::NotFound {
            queue: queue.to_owned(),
        })?;
        match state.messages.iter().position(|m| m.id == id) {
            Some(index) => {
                state.messages.remove(index);
                Ok(())
            }
            None => Err(QueueError::MessageNotFound {
                queue: queue.to_owned(),
                id: id.to_owned(),
            }),
        }
    }
}
