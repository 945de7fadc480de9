//! Asynchronous task scheduling
//!
//! Priority-ordered execution of async tasks under a concurrency bound, with
//! abort signals and lifecycle events.

pub mod cancellation;
pub mod task_scheduler;

pub use cancellation::CancellationToken;
pub use task_scheduler::{AddOptions, SchedulerEvent, TaskScheduler};
