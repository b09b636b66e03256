//! Notification work submission and processing.
//!
//! This module provides the gateway that accepts inbound notifications, the
//! background scheduler that executes them at most once per outstanding key,
//! and the processing pipeline that guarantees exactly-once delivery
//! completion per cycle.

mod completion;
mod delay;
mod gateway;
mod models;
mod pipeline;
mod scheduler;

pub use completion::{completion_channel, TaskCompleter, TaskResult};
pub use delay::DelayTaskExecutor;
pub use gateway::WorkGateway;
pub use models::{NotificationRecord, WorkPolicy, WorkRequest};
pub use pipeline::{
    DeliverySink, HandlerContext, NotificationPipeline, ProcessError, ReceivedEvent,
    ReceivedHandler,
};
pub use scheduler::{TokioWorkScheduler, WorkScheduler};
