//! Persistent in-app message state.

mod models;
mod reconciler;
mod schema;
mod store;

pub use models::{DisplayStats, InAppMessage};
pub use reconciler::MessageReconciler;
pub use store::{MessageStore, SqliteMessageStore};

/// Maximum age of a cached message before it becomes evictable: 180 days,
/// derived as 6 months of 30 days.
pub const MESSAGE_MAX_CACHE_AGE_SECS: i64 = 6 * 30 * 24 * 60 * 60;
