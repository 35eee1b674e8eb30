//! Asynchronous notification dispatch: queue, senders, workers.

pub mod queue;
pub mod sender;
pub mod worker;

pub use queue::{InProcessQueue, NotificationTask, TaskQueue};
pub use sender::{MockEmailSender, NotificationSender, SmtpConfig, SmtpSender};
pub use worker::{NotificationWorker, TaskOutcome, WorkerConfig, spawn_workers};
