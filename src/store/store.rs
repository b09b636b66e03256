//! In-app message store implementation.
//!
//! Storage errors never propagate to callers: every operation logs and
//! swallows failures, leaving the store in whatever state the partial
//! operation produced. Callers that need a signal must observe it through
//! `list`.

use super::models::{DisplayStats, InAppMessage};
use super::schema::MESSAGE_VERSIONED_SCHEMAS;
use super::MESSAGE_MAX_CACHE_AGE_SECS;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

/// Trait for message state storage operations.
pub trait MessageStore: Send + Sync {
    /// Upsert a message keyed by its message id.
    fn save(&self, message: &InAppMessage);

    /// Delete a message inside an explicit transaction. Fire-and-forget:
    /// the caller receives no success/failure signal.
    fn delete(&self, message_id: &str);

    /// Return every stored message. A malformed click-id column aborts the
    /// remainder of the listing and the partial accumulation is returned.
    fn list(&self) -> Vec<InAppMessage>;

    /// Delete every message whose last display is older than the cache age
    /// cutoff relative to `now_seconds`.
    fn evict_stale(&self, now_seconds: i64);

    /// Evict against the current wall clock. Intended for the embedding's
    /// startup or refresh hook, nothing in the store triggers it on a timer.
    fn evict_stale_now(&self) {
        self.evict_stale(chrono::Utc::now().timestamp());
    }
}

/// SQLite-backed message store.
///
/// All operations serialize on a single connection mutex: at most one call
/// executes at a time across the whole store. Writes only happen on display
/// and dedup events, so crash consistency is worth the throughput trade.
pub struct SqliteMessageStore {
    conn: Arc<Mutex<Connection>>,
    max_cache_age_secs: i64,
}

impl SqliteMessageStore {
    /// Open an existing database or create a new one with the current
    /// schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let existed = db_path.as_ref().exists();
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open message database at {:?}", db_path.as_ref()))?;

        let schema = MESSAGE_VERSIONED_SCHEMAS
            .last()
            .context("No message schemas defined")?;
        conn.execute_batch(schema.up)
            .context("Failed to initialize message schema")?;

        if !existed {
            info!("Created new message database at {:?}", db_path.as_ref());
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            max_cache_age_secs: MESSAGE_MAX_CACHE_AGE_SECS,
        })
    }

    /// Create an in-memory store, mainly for tests and embedding.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let schema = MESSAGE_VERSIONED_SCHEMAS
            .last()
            .context("No message schemas defined")?;
        conn.execute_batch(schema.up)
            .context("Failed to initialize message schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            max_cache_age_secs: MESSAGE_MAX_CACHE_AGE_SECS,
        })
    }

    /// Override the eviction age, typically from resolved config.
    pub fn with_max_cache_age(mut self, secs: i64) -> Self {
        self.max_cache_age_secs = secs;
        self
    }

    fn try_save(conn: &Connection, message: &InAppMessage) -> rusqlite::Result<()> {
        let click_ids = message.click_ids_column();
        let rows_updated = conn.execute(
            r#"UPDATE in_app_message
               SET display_quantity = ?2, last_display_time = ?3, click_ids = ?4, displayed = ?5
               WHERE message_id = ?1"#,
            params![
                message.message_id,
                message.display_stats.display_quantity,
                message.display_stats.last_display_time,
                click_ids,
                message.displayed as i64,
            ],
        )?;

        if rows_updated == 0 {
            conn.execute(
                r#"INSERT INTO in_app_message
                   (message_id, display_quantity, last_display_time, click_ids, displayed)
                   VALUES (?1, ?2, ?3, ?4, ?5)"#,
                params![
                    message.message_id,
                    message.display_stats.display_quantity,
                    message.display_stats.last_display_time,
                    click_ids,
                    message.displayed as i64,
                ],
            )?;
        }
        Ok(())
    }
}

impl MessageStore for SqliteMessageStore {
    fn save(&self, message: &InAppMessage) {
        let conn = self.conn.lock().unwrap();
        if let Err(e) = Self::try_save(&conn, message) {
            error!("Error saving in-app message {}: {}", message.message_id, e);
        }
    }

    fn delete(&self, message_id: &str) {
        let conn = self.conn.lock().unwrap();
        let tx = match conn.unchecked_transaction() {
            Ok(tx) => tx,
            Err(e) => {
                error!(
                    "Error opening delete transaction for in-app message {}: {}",
                    message_id, e
                );
                return;
            }
        };

        match tx.execute(
            "DELETE FROM in_app_message WHERE message_id = ?1",
            [message_id],
        ) {
            Ok(_) => {
                if let Err(e) = tx.commit() {
                    error!(
                        "Error committing delete of in-app message {}: {}",
                        message_id, e
                    );
                }
            }
            Err(e) => {
                error!("Error deleting in-app message {}: {}", message_id, e);
                if let Err(e) = tx.rollback() {
                    error!(
                        "Error closing delete transaction for in-app message {}: {}",
                        message_id, e
                    );
                }
            }
        }
    }

    fn list(&self) -> Vec<InAppMessage> {
        let conn = self.conn.lock().unwrap();
        let mut messages = Vec::new();

        let mut stmt = match conn.prepare(
            r#"SELECT message_id, display_quantity, last_display_time, click_ids, displayed
               FROM in_app_message"#,
        ) {
            Ok(stmt) => stmt,
            Err(e) => {
                error!("Error preparing in-app message listing: {}", e);
                return messages;
            }
        };

        let mut rows = match stmt.query([]) {
            Ok(rows) => rows,
            Err(e) => {
                error!("Error querying in-app messages: {}", e);
                return messages;
            }
        };

        loop {
            let row = match rows.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => {
                    error!("Error reading in-app message row: {}", e);
                    break;
                }
            };

            let parsed = (|| -> rusqlite::Result<(String, i64, i64, String, i64)> {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })();
            let (message_id, display_quantity, last_display_time, click_ids, displayed) =
                match parsed {
                    Ok(fields) => fields,
                    Err(e) => {
                        error!("Error reading in-app message columns: {}", e);
                        break;
                    }
                };

            let clicked_click_ids = match InAppMessage::click_ids_from_column(&click_ids) {
                Ok(ids) => ids,
                Err(e) => {
                    // Abort the remainder, return what accumulated so far
                    error!(
                        "Malformed click id column for in-app message {}: {}",
                        message_id, e
                    );
                    break;
                }
            };

            messages.push(InAppMessage {
                message_id,
                clicked_click_ids,
                displayed: displayed == 1,
                display_stats: DisplayStats {
                    display_quantity,
                    last_display_time,
                },
            });
        }

        messages
    }

    fn evict_stale(&self, now_seconds: i64) {
        let cutoff = now_seconds - self.max_cache_age_secs;
        let stale_ids: Vec<String> = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = match conn
                .prepare("SELECT message_id FROM in_app_message WHERE last_display_time < ?1")
            {
                Ok(stmt) => stmt,
                Err(e) => {
                    error!("Error preparing stale message lookup: {}", e);
                    return;
                }
            };

            match stmt
                .query_map([cutoff], |row| row.get(0))
                .and_then(|mapped| mapped.collect())
            {
                Ok(ids) => ids,
                Err(e) => {
                    error!("Error locating stale in-app messages: {}", e);
                    return;
                }
            }
        };

        if stale_ids.is_empty() {
            return;
        }
        debug!("Evicting {} stale in-app messages", stale_ids.len());
        for message_id in &stale_ids {
            self.delete(message_id);
        }
    }
}
