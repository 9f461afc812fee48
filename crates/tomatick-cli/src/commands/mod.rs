pub mod config;
pub mod run;
pub mod stats;
pub mod timer;

use std::sync::Arc;

use tomatick_core::storage::{Database, KeyValueStore, SettingsStore};
use tomatick_core::{Pomodoro, SystemClock};

use crate::feedback::TerminalBell;

pub(crate) fn open_store() -> Result<Arc<dyn KeyValueStore>, Box<dyn std::error::Error>> {
    Ok(Arc::new(Database::open()?))
}

/// Load the persisted session with the current settings.
pub(crate) fn load_core(store: Arc<dyn KeyValueStore>) -> Pomodoro {
    let settings = SettingsStore::load(store.clone()).current();
    Pomodoro::load(
        settings,
        store,
        Arc::new(SystemClock),
        Box::new(TerminalBell),
    )
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
