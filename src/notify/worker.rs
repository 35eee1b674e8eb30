//! Notification worker — drains the task queue off the request path.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::queue::{NotificationTask, TaskQueue};
use super::sender::NotificationSender;
use crate::error::SendError;

/// Retry policy for a worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Total attempts per task before it is dropped.
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub backoff_base: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Terminal state of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Sent; task discarded.
    Succeeded,
    /// Transient failure; task re-enqueued after backoff.
    Retrying,
    /// Fatal failure or retries exhausted; task discarded.
    Dropped,
}

/// Executes notification tasks pulled from the shared queue.
///
/// Workers run on their own tokio tasks and never on the request path
/// that enqueued the work.
pub struct NotificationWorker {
    queue: Arc<dyn TaskQueue>,
    sender: Arc<dyn NotificationSender>,
    config: WorkerConfig,
}

impl NotificationWorker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        sender: Arc<dyn NotificationSender>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            sender,
            config,
        }
    }

    /// Execute a single task: one send attempt plus retry bookkeeping.
    pub async fn execute(&self, mut task: NotificationTask) -> TaskOutcome {
        task.attempts += 1;

        match self.sender.send(&task.recipient_address).await {
            Ok(()) => {
                info!(
                    task_id = %task.id,
                    recipient = %task.recipient_address,
                    attempts = task.attempts,
                    sender = self.sender.name(),
                    "Notification delivered"
                );
                TaskOutcome::Succeeded
            }
            Err(SendError::Transient(reason)) => {
                if task.attempts >= self.config.max_attempts {
                    warn!(
                        task_id = %task.id,
                        attempts = task.attempts,
                        reason = %reason,
                        "Retries exhausted; dropping notification task"
                    );
                    return TaskOutcome::Dropped;
                }

                let delay = backoff_delay(self.config.backoff_base, task.attempts);
                warn!(
                    task_id = %task.id,
                    attempts = task.attempts,
                    delay_ms = delay.as_millis() as u64,
                    reason = %reason,
                    "Transient send failure; re-enqueueing"
                );

                // Delayed re-enqueue off this worker's schedule, so the
                // backoff never stalls the queue for other tasks.
                let queue = Arc::clone(&self.queue);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = queue.enqueue(task).await {
                        warn!(error = %e, "Failed to re-enqueue notification task");
                    }
                });

                TaskOutcome::Retrying
            }
            Err(SendError::Fatal(reason)) => {
                error!(
                    task_id = %task.id,
                    recipient = %task.recipient_address,
                    reason = %reason,
                    "Fatal send failure; dropping notification task"
                );
                TaskOutcome::Dropped
            }
        }
    }

    /// Claim-and-execute loop. Exits when the queue is closed and drained.
    pub async fn run(&self) {
        while let Some(task) = self.queue.dequeue().await {
            self.execute(task).await;
        }
        info!(sender = self.sender.name(), "Notification worker stopped");
    }
}

/// Exponential backoff: base * 2^(attempts - 1), exponent capped.
fn backoff_delay(base: Duration, attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(10);
    base * 2u32.pow(exponent)
}

/// Spawn `count` workers sharing one queue and sender.
pub fn spawn_workers(
    worker: Arc<NotificationWorker>,
    count: usize,
) -> Vec<tokio::task::JoinHandle<()>> {
    (0..count)
        .map(|_| {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.run().await })
        })
        .collect()
}
