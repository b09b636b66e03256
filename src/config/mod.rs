mod file_config;

pub use file_config::{FileConfig, MessagesConfig, WorkConfig};

use crate::store::MESSAGE_MAX_CACHE_AGE_SECS;
use anyhow::{bail, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,

    // Feature settings (with defaults)
    pub messages: MessagesSettings,
    pub work: WorkSettings,
}

#[derive(Debug, Clone)]
pub struct MessagesSettings {
    pub cache_max_age_secs: i64,
    pub reconcile_max_concurrent_deletes: usize,
}

impl Default for MessagesSettings {
    fn default() -> Self {
        Self {
            cache_max_age_secs: MESSAGE_MAX_CACHE_AGE_SECS,
            reconcile_max_concurrent_deletes: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkSettings {
    pub delay_max_secs: u64,
}

impl Default for WorkSettings {
    fn default() -> Self {
        Self { delay_max_secs: 25 }
    }
}

impl AppConfig {
    /// Resolve configuration from an embedding-provided db dir and optional
    /// TOML file config. TOML values override the embedding values where
    /// present.
    pub fn resolve(db_dir: Option<PathBuf>, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or(db_dir)
            .ok_or_else(|| anyhow::anyhow!("db_dir must be specified or set in config file"))?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let messages_file = file.messages.unwrap_or_default();
        let messages_defaults = MessagesSettings::default();
        let cache_max_age_secs = messages_file
            .cache_max_age_secs
            .unwrap_or(messages_defaults.cache_max_age_secs);
        if cache_max_age_secs <= 0 {
            bail!("messages.cache_max_age_secs must be positive");
        }
        let reconcile_max_concurrent_deletes = messages_file
            .reconcile_max_concurrent_deletes
            .unwrap_or(messages_defaults.reconcile_max_concurrent_deletes);
        if reconcile_max_concurrent_deletes == 0 {
            bail!("messages.reconcile_max_concurrent_deletes must be at least 1");
        }
        let messages = MessagesSettings {
            cache_max_age_secs,
            reconcile_max_concurrent_deletes,
        };

        let work_file = file.work.unwrap_or_default();
        let work = WorkSettings {
            delay_max_secs: work_file
                .delay_max_secs
                .unwrap_or(WorkSettings::default().delay_max_secs),
        };

        Ok(Self {
            db_dir,
            messages,
            work,
        })
    }

    pub fn message_db_path(&self) -> PathBuf {
        self.db_dir.join("messages.db")
    }
}
