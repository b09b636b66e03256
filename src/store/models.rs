//! In-app message data models.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Display bookkeeping for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayStats {
    /// How many times the message was displayed. Non-decreasing.
    pub display_quantity: i64,
    /// Unix seconds of the latest display.
    pub last_display_time: i64,
}

/// A locally persisted in-app message.
///
/// Value equality drives reconciliation: a saved message survives only if an
/// equal record is present in the remote list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InAppMessage {
    pub message_id: String,
    /// Click ids recorded for this message. Only grows until the record is
    /// deleted.
    pub clicked_click_ids: HashSet<String>,
    pub displayed: bool,
    pub display_stats: DisplayStats,
}

impl InAppMessage {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            clicked_click_ids: HashSet::new(),
            displayed: false,
            display_stats: DisplayStats {
                display_quantity: 0,
                last_display_time: 0,
            },
        }
    }

    /// Serialize the click-id set for the TEXT column. Sorted for a stable
    /// representation.
    pub(crate) fn click_ids_column(&self) -> String {
        let mut ids: Vec<&str> = self.clicked_click_ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string())
    }

    /// Reconstruct a click-id set from the serialized array column.
    pub(crate) fn click_ids_from_column(raw: &str) -> Result<HashSet<String>, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
