mod database;
mod memory;
mod settings;
mod statistics;

pub use database::Database;
pub use memory::MemoryStore;
pub use settings::{
    Settings, SettingsStore, SkipMode, SoundMode, Theme, Toggle, SETTINGS_KEY,
};
pub use statistics::{load_ledger, save_ledger, STATISTICS_KEY};

use std::path::PathBuf;

use crate::error::StorageError;

/// Durable key-value storage collaborator.
///
/// Treated as eventually-consistent: the engine keeps its in-memory state
/// authoritative and never rolls back on a failed write.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Returns `~/.config/tomatick[-dev]/` based on TOMATICK_ENV.
///
/// Set TOMATICK_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TOMATICK_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("tomatick-dev")
    } else {
        base_dir.join("tomatick")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| StorageError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
