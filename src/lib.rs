//! Signalbox in-app messaging core.
//!
//! This library implements the notification processing subsystem: an
//! in-flight dedup registry, a work submission gateway with keep-if-duplicate
//! scheduling, a processing pipeline with exactly-once delivery completion,
//! a persistent in-app message store, and reconciliation against a remote
//! message list.

pub mod config;
pub mod dedup;
pub mod store;
pub mod work;

// Re-export commonly used types for convenience
pub use dedup::InFlightRegistry;
pub use store::{
    DisplayStats, InAppMessage, MessageReconciler, MessageStore, SqliteMessageStore,
    MESSAGE_MAX_CACHE_AGE_SECS,
};
pub use work::{
    DelayTaskExecutor, DeliverySink, HandlerContext, NotificationPipeline, NotificationRecord,
    ProcessError, ReceivedEvent, ReceivedHandler, TokioWorkScheduler, WorkGateway, WorkPolicy,
    WorkRequest, WorkScheduler,
};
