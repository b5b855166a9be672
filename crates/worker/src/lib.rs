//! Queue worker: takes one job at a time from a durable queue, runs it in an
//! isolated child, acknowledges it and reports completion to the coordinator.

pub mod config;
pub mod notifier;
pub mod worker;

pub use config::WorkerConfig;
pub use notifier::{CompletionNotifier, HttpNotifier, NotifyError};
pub use worker::{Handled, Worker};
