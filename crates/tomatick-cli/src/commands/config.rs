use clap::Subcommand;
use tomatick_core::SettingsStore;

use super::{open_store, print_json};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a setting (e.g. "focusDuration", "stepsMode")
    Get {
        /// Setting key
        key: String,
    },
    /// Set a setting
    Set {
        /// Setting key
        key: String,
        /// New value
        value: String,
    },
    /// List all settings
    List,
    /// Reset settings to defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    let settings = SettingsStore::load(open_store()?);

    match action {
        ConfigAction::Get { key } => match settings.get(&key) {
            Some(value) => println!("{value}"),
            None => {
                eprintln!("unknown key: {key}");
                std::process::exit(1);
            }
        },
        ConfigAction::Set { key, value } => {
            settings.update(&key, &value)?;
            println!("ok");
        }
        ConfigAction::List => print_json(&settings.current())?,
        ConfigAction::Reset => {
            settings.reset_to_defaults()?;
            println!("settings reset to defaults");
        }
    }
    Ok(())
}
