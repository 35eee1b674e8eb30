//! Account domain events — typed bus decoupling writes from side effects.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::NotifyError;
use crate::notify::{NotificationTask, TaskQueue};

/// A primary account was created.
///
/// The account entity itself is owned elsewhere; this core only reacts to
/// its creation instant and contact address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCreated {
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl AccountCreated {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            created_at: Utc::now(),
        }
    }
}

/// A subscriber to account-creation events.
#[async_trait]
pub trait AccountEventSubscriber: Send + Sync {
    fn name(&self) -> &str;

    async fn on_account_created(&self, event: &AccountCreated) -> Result<(), NotifyError>;
}

/// Explicit event bus with a registered subscriber list.
///
/// Any component may publish; `publish` delivers to every subscriber
/// before returning, so a successful hand-off is never lost. Task
/// completion is never awaited here — that belongs to the workers.
pub struct AccountEventBus {
    subscribers: RwLock<Vec<Arc<dyn AccountEventSubscriber>>>,
}

impl AccountEventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: RwLock::new(Vec::new()),
        })
    }

    /// Register a subscriber for all future events.
    pub async fn subscribe(&self, subscriber: Arc<dyn AccountEventSubscriber>) {
        info!(subscriber = subscriber.name(), "Event subscriber registered");
        self.subscribers.write().await.push(subscriber);
    }

    /// Publish an event to every registered subscriber, in registration
    /// order. All subscribers are attempted even if one fails; the first
    /// failure is returned to the publisher.
    pub async fn publish(&self, event: AccountCreated) -> Result<(), NotifyError> {
        info!(
            username = %event.username,
            email = %event.email,
            "Account created event published"
        );

        let subscribers = self.subscribers.read().await;
        let mut first_error = None;

        for subscriber in subscribers.iter() {
            if let Err(e) = subscriber.on_account_created(&event).await {
                tracing::warn!(
                    subscriber = subscriber.name(),
                    error = %e,
                    "Event subscriber failed"
                );
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Production subscriber: enqueues one welcome-email task per creation.
pub struct WelcomeEmailEnqueuer {
    queue: Arc<dyn TaskQueue>,
}

impl WelcomeEmailEnqueuer {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl AccountEventSubscriber for WelcomeEmailEnqueuer {
    fn name(&self) -> &str {
        "welcome-email"
    }

    async fn on_account_created(&self, event: &AccountCreated) -> Result<(), NotifyError> {
        let task = NotificationTask::new(event.email.clone());
        let task_id = self.queue.enqueue(task).await?;
        info!(
            username = %event.username,
            task_id = %task_id,
            "Welcome email task enqueued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::InProcessQueue;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    struct CountingSubscriber {
        seen: AtomicU32,
    }

    impl CountingSubscriber {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl AccountEventSubscriber for CountingSubscriber {
        fn name(&self) -> &str {
            "counting"
        }

        async fn on_account_created(&self, _event: &AccountCreated) -> Result<(), NotifyError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingSubscriber;

    #[async_trait]
    impl AccountEventSubscriber for FailingSubscriber {
        fn name(&self) -> &str {
            "failing"
        }

        async fn on_account_created(&self, _event: &AccountCreated) -> Result<(), NotifyError> {
            Err(NotifyError::Enqueue("broker down".into()))
        }
    }

    #[tokio::test]
    async fn every_subscriber_sees_each_event() {
        let bus = AccountEventBus::new();
        let first = CountingSubscriber::new();
        let second = CountingSubscriber::new();
        bus.subscribe(Arc::clone(&first) as Arc<dyn AccountEventSubscriber>)
            .await;
        bus.subscribe(Arc::clone(&second) as Arc<dyn AccountEventSubscriber>)
            .await;

        bus.publish(AccountCreated::new("ada", "ada@example.com"))
            .await
            .unwrap();
        bus.publish(AccountCreated::new("grace", "grace@example.com"))
            .await
            .unwrap();

        assert_eq!(first.seen.load(Ordering::SeqCst), 2);
        assert_eq!(second.seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn one_failing_subscriber_does_not_starve_others() {
        let bus = AccountEventBus::new();
        let counting = CountingSubscriber::new();
        bus.subscribe(Arc::new(FailingSubscriber)).await;
        bus.subscribe(Arc::clone(&counting) as Arc<dyn AccountEventSubscriber>)
            .await;

        let err = bus
            .publish(AccountCreated::new("ada", "ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Enqueue(_)));
        assert_eq!(counting.seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn creation_enqueues_exactly_one_task() {
        let queue = InProcessQueue::new();
        let bus = AccountEventBus::new();
        bus.subscribe(Arc::new(WelcomeEmailEnqueuer::new(
            queue.clone() as Arc<dyn TaskQueue>
        )))
        .await;

        bus.publish(AccountCreated::new("ada", "ada@example.com"))
            .await
            .unwrap();

        assert_eq!(queue.len().await, 1);
        let task = queue.dequeue().await.unwrap();
        assert_eq!(task.recipient_address, "ada@example.com");
        assert_eq!(task.attempts, 0);
    }

    #[tokio::test]
    async fn publish_does_not_wait_for_task_execution() {
        // No worker is draining the queue; publishing must still return
        // immediately after the hand-off.
        let queue = InProcessQueue::new();
        let bus = AccountEventBus::new();
        bus.subscribe(Arc::new(WelcomeEmailEnqueuer::new(
            queue.clone() as Arc<dyn TaskQueue>
        )))
        .await;

        let started = Instant::now();
        bus.publish(AccountCreated::new("ada", "ada@example.com"))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn closed_queue_surfaces_to_publisher() {
        let queue = InProcessQueue::new();
        queue.close();

        let bus = AccountEventBus::new();
        bus.subscribe(Arc::new(WelcomeEmailEnqueuer::new(
            queue as Arc<dyn TaskQueue>,
        )))
        .await;

        let err = bus
            .publish(AccountCreated::new("ada", "ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::QueueClosed));
    }
}
