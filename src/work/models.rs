//! Notification work data models.

use serde::{Deserialize, Serialize};

/// A notification as seen by the processing pipeline.
///
/// The payload is kept opaque: shaping its contents into display/action data
/// is the business of downstream collaborators, not of this subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub notification_id: String,
    /// Platform-assigned integer id for the rendered notification.
    pub platform_id: i32,
    pub payload: serde_json::Value,
    /// Receive time in unix seconds.
    pub timestamp: i64,
    pub is_restoring: bool,
    /// Accepted but currently inert: priority does not influence scheduling.
    pub is_high_priority: bool,
}

/// A unit of work submitted to the gateway. The notification id doubles as
/// the unique scheduling key; the payload stays a raw JSON string until the
/// pipeline (or the inline path) parses it.
#[derive(Debug, Clone)]
pub struct WorkRequest {
    pub notification_id: String,
    pub platform_id: i32,
    pub payload: String,
    pub timestamp: i64,
    pub is_restoring: bool,
    pub is_high_priority: bool,
}

impl WorkRequest {
    /// Parse the raw payload. This is the single deserialization point for
    /// both the inline and background paths.
    pub fn parse_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }

    /// Build the notification record for one processing cycle from this
    /// request and its already-parsed payload.
    pub fn to_notification(&self, payload: serde_json::Value) -> NotificationRecord {
        NotificationRecord {
            notification_id: self.notification_id.clone(),
            platform_id: self.platform_id,
            payload,
            timestamp: self.timestamp,
            is_restoring: self.is_restoring,
            is_high_priority: self.is_high_priority,
        }
    }
}

/// Dispatch policy for keyed background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkPolicy {
    /// Drop the new submission when a job with the same key is queued or
    /// running.
    Keep,
    /// Accept the new submission alongside the outstanding one. Scheduled
    /// work in this subsystem is never cancelled, so the outstanding job
    /// still runs to completion.
    Replace,
}
