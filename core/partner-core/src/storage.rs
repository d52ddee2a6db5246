//! Storage configuration and path management.
//!
//! Production code uses `StorageConfig::default()` which points to
//! `~/.thought-partner/`. Tests use `StorageConfig::with_root(temp_dir)`.

use std::path::{Path, PathBuf};

pub const STATE_FILE_NAME: &str = "thought-partner-state.json";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const SOCKET_NAME: &str = "partner.sock";

/// Central configuration for all on-disk paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let root = dirs::home_dir()
            .map(|home| home.join(".thought-partner"))
            .unwrap_or_else(|| std::env::temp_dir().join("thought-partner"));
        Self { root }
    }
}

impl StorageConfig {
    /// Creates a StorageConfig with a custom root directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the persisted canonical state.
    pub fn state_file(&self) -> PathBuf {
        self.root.join(STATE_FILE_NAME)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Path to the host's request socket.
    pub fn socket_path(&self) -> PathBuf {
        self.root.join(SOCKET_NAME)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}
