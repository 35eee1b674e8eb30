//! Task queue — producers append, workers claim-and-remove.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tracing::debug;
use uuid::Uuid;

use crate::error::NotifyError;

/// A unit of notification work.
///
/// Transient: lives only on the queue. `attempts` is the retry bookkeeping
/// the worker consults against its backoff policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTask {
    pub id: Uuid,
    pub recipient_address: String,
    pub attempts: u32,
}

impl NotificationTask {
    pub fn new(recipient_address: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_address: recipient_address.into(),
            attempts: 0,
        }
    }
}

/// Queue abstraction between the event bus and the notification workers.
///
/// Backed by an in-process queue here; a message broker can stand in
/// without touching worker logic.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Append a task. Returns its id once the task is durably accepted.
    async fn enqueue(&self, task: NotificationTask) -> Result<Uuid, NotifyError>;

    /// Claim the next task, waiting until one is available.
    /// Returns `None` once the queue is closed and drained.
    async fn dequeue(&self) -> Option<NotificationTask>;

    /// Number of tasks currently queued.
    async fn len(&self) -> usize;

    /// Close the queue: pending tasks still drain, new enqueues fail.
    fn close(&self);
}

/// In-process task queue (tests and single-node deployments).
pub struct InProcessQueue {
    tasks: Mutex<VecDeque<NotificationTask>>,
    notify: Notify,
    closed: AtomicBool,
}

impl InProcessQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tasks: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl TaskQueue for InProcessQueue {
    async fn enqueue(&self, task: NotificationTask) -> Result<Uuid, NotifyError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(NotifyError::QueueClosed);
        }

        let id = task.id;
        debug!(task_id = %id, recipient = %task.recipient_address, "Task enqueued");
        {
            let mut tasks = self.tasks.lock().await;
            tasks.push_back(task);
        }
        self.notify.notify_one();
        Ok(id)
    }

    async fn dequeue(&self) -> Option<NotificationTask> {
        loop {
            // Register for a wakeup before checking, so an enqueue between
            // the check and the await is not missed.
            let notified = self.notify.notified();

            if let Some(task) = self.tasks.lock().await.pop_front() {
                return Some(task);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }

            notified.await;
        }
    }

    async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn enqueue_then_dequeue_fifo() {
        let queue = InProcessQueue::new();

        let first = NotificationTask::new("a@example.com");
        let second = NotificationTask::new("b@example.com");
        queue.enqueue(first.clone()).await.unwrap();
        queue.enqueue(second.clone()).await.unwrap();

        assert_eq!(queue.len().await, 2);
        assert_eq!(queue.dequeue().await.unwrap(), first);
        assert_eq!(queue.dequeue().await.unwrap(), second);
        assert_eq!(queue.len().await, 0);
    }

    #[tokio::test]
    async fn dequeue_waits_for_producer() {
        let queue = InProcessQueue::new();

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue().await })
        };

        // Give the consumer time to park
        tokio::time::sleep(Duration::from_millis(20)).await;
        let task = NotificationTask::new("late@example.com");
        queue.enqueue(task.clone()).await.unwrap();

        let claimed = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed, Some(task));
    }

    #[tokio::test]
    async fn close_unblocks_waiters_with_none() {
        let queue = InProcessQueue::new();

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let claimed = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed, None);
    }

    #[tokio::test]
    async fn closed_queue_rejects_enqueue() {
        let queue = InProcessQueue::new();
        queue.close();

        let err = queue
            .enqueue(NotificationTask::new("x@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::QueueClosed));
    }

    #[tokio::test]
    async fn close_drains_remaining_tasks() {
        let queue = InProcessQueue::new();
        queue.enqueue(NotificationTask::new("a@example.com")).await.unwrap();
        queue.close();

        assert!(queue.dequeue().await.is_some());
        assert!(queue.dequeue().await.is_none());
    }
}
