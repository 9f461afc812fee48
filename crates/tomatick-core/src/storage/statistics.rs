//! Persistence of the statistics ledger.

use tracing::warn;

use super::KeyValueStore;
use crate::error::Result;
use crate::stats::Ledger;

pub const STATISTICS_KEY: &str = "statistics-storage";

/// Load the ledger. A missing record is an empty ledger; an unreadable or
/// corrupt one is logged and replaced by an empty ledger.
pub fn load_ledger(store: &dyn KeyValueStore) -> Ledger {
    match store.get(STATISTICS_KEY) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "statistics ledger is corrupt, starting empty");
            Ledger::new()
        }),
        Ok(None) => Ledger::new(),
        Err(e) => {
            warn!(error = %e, "failed to read statistics ledger, starting empty");
            Ledger::new()
        }
    }
}

/// # Errors
/// Returns an error if the ledger cannot be serialized or written.
pub fn save_ledger(store: &dyn KeyValueStore, ledger: &Ledger) -> Result<()> {
    let json = serde_json::to_string(ledger)?;
    store.set(STATISTICS_KEY, &json)?;
    Ok(())
}
