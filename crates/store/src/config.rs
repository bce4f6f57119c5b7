//! Queue store configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SQLite queue store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file. `:memory:` opens a private in-memory database.
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// How long a writer waits on a locked database before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Write-ahead logging, lets receiver and processors share the file
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

fn default_path() -> PathBuf {
    PathBuf::from("data/inbox.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_wal_mode() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            wal_mode: default_wal_mode(),
        }
    }
}

impl StoreConfig {
    /// Config for a file-backed store at `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            wal_mode: false,
            ..Self::default()
        }
    }

    pub fn is_memory(&self) -> bool {
        self.path.to_str() == Some(":memory:")
    }
}
