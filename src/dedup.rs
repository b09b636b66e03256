//! In-flight notification dedup registry.
//!
//! Work queued against a unique key is not enough on its own: a job that has
//! already finished frees its key, so a fast duplicate of a notification that
//! is processed but not yet completed could be queued again. The registry
//! keeps the ids of notifications currently being processed and lets callers
//! gate on membership.

use std::collections::HashSet;
use std::sync::Mutex;
use tracing::debug;

/// Concurrent set of notification ids currently in flight.
///
/// There is no TTL: an id stays registered until the caller removes it, so
/// `add_if_absent`/`remove` must be called symmetrically. A caller that never
/// removes an id leaks that key permanently.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    ids: Mutex<HashSet<String>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` and return true if it was absent. Returns false without
    /// modifying the set when the id is already in flight. An empty id is a
    /// no-op key and always returns true.
    pub fn add_if_absent(&self, id: &str) -> bool {
        if id.is_empty() {
            return true;
        }

        let mut ids = self.ids.lock().unwrap();
        if ids.contains(id) {
            debug!("Notification {} already in flight, rejecting duplicate", id);
            return false;
        }
        ids.insert(id.to_string());
        true
    }

    /// Unregister `id`. No-op when absent or empty.
    pub fn remove(&self, id: &str) {
        if id.is_empty() {
            return;
        }
        self.ids.lock().unwrap().remove(id);
    }
}

#[cfg(test)]
impl InFlightRegistry {
    fn len(&self) -> usize {
        self.ids.lock().unwrap().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
