//! User settings and their persistence.
//!
//! Stores user preferences including:
//! - Phase durations (seconds)
//! - Auto/manual advance after a phase completes
//! - Active scenario (`stepsMode`)
//! - Sound, ambient music and theme choices consumed by the presentation layer
//!
//! Settings are stored as camelCase JSON under [`SETTINGS_KEY`]. Loading is
//! lenient: every field is merged with its default independently, so a
//! partially corrupt record still yields usable settings.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::KeyValueStore;
use crate::error::{ConfigError, CoreError, Result};
use crate::timer::StepsMode;

pub const SETTINGS_KEY: &str = "settings-storage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Theme {
    System,
    #[default]
    Light,
    Dark,
}

/// On/off switch for ambient (lofi) playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Toggle {
    On,
    #[default]
    Off,
}

/// `System` gives haptic feedback, `On` plays sounds, `Off` is silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SoundMode {
    #[default]
    System,
    On,
    Off,
}

/// Whether the next phase starts by itself after a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SkipMode {
    #[default]
    Manual,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub lofi: Toggle,
    #[serde(default)]
    pub sound: SoundMode,
    #[serde(default)]
    pub skip: SkipMode,
    #[serde(default = "default_focus_duration")]
    pub focus_duration: u64,
    #[serde(default = "default_short_break")]
    pub short_break_duration: u64,
    #[serde(default = "default_long_break")]
    pub long_break_duration: u64,
    #[serde(default)]
    pub steps_mode: StepsMode,
}

fn default_focus_duration() -> u64 {
    1500
}
fn default_short_break() -> u64 {
    300
}
fn default_long_break() -> u64 {
    900
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            lofi: Toggle::default(),
            sound: SoundMode::default(),
            skip: SkipMode::default(),
            focus_duration: default_focus_duration(),
            short_break_duration: default_short_break(),
            long_break_duration: default_long_break(),
            steps_mode: StepsMode::default(),
        }
    }
}

impl Settings {
    /// Decode a persisted settings record, never failing.
    ///
    /// Each field present in `raw` replaces its default only if it decodes
    /// on its own; unknown fields are ignored.
    pub fn from_json_lenient(raw: &str) -> Self {
        let defaults = Self::default();
        let parsed = match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Object(obj)) => obj,
            Ok(_) => {
                warn!("persisted settings are not an object, using defaults");
                return defaults;
            }
            Err(e) => {
                warn!(error = %e, "persisted settings are not valid JSON, using defaults");
                return defaults;
            }
        };
        let Ok(serde_json::Value::Object(mut merged)) = serde_json::to_value(&defaults) else {
            return defaults;
        };

        for (key, candidate) in parsed {
            let Some(previous) = merged.insert(key.clone(), candidate) else {
                merged.remove(&key);
                debug!(key = %key, "ignoring unknown settings field");
                continue;
            };
            let probe = serde_json::Value::Object(merged.clone());
            if serde_json::from_value::<Settings>(probe).is_err() {
                warn!(key = %key, "malformed settings field, keeping default");
                merged.insert(key, previous);
            }
        }

        serde_json::from_value(serde_json::Value::Object(merged)).unwrap_or(defaults)
    }

    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> std::result::Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Get a settings value as string by (dot-separated) key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Return a copy with `key` set to `value`, parsed according to the
    /// field's current type.
    ///
    /// # Errors
    /// Returns an error if the key is unknown or the value does not fit.
    pub fn with_value(&self, key: &str, value: &str) -> Result<Self> {
        let mut json = serde_json::to_value(self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        serde_json::from_value(json).map_err(|e| {
            CoreError::Config(ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })
        })
    }
}

/// Settings collaborator: owns the current settings, persists them, and
/// notifies subscribers on every change.
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
    tx: watch::Sender<Settings>,
}

impl SettingsStore {
    /// Load settings from `store`. Missing or unreadable records yield
    /// defaults; this never fails.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let settings = match store.get(SETTINGS_KEY) {
            Ok(Some(raw)) => Settings::from_json_lenient(&raw),
            Ok(None) => Settings::default(),
            Err(e) => {
                warn!(error = %e, "failed to read settings, using defaults");
                Settings::default()
            }
        };
        let (tx, _rx) = watch::channel(settings);
        Self { store, tx }
    }

    pub fn current(&self) -> Settings {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    /// Replace the whole settings object.
    ///
    /// Subscribers are notified even if persisting fails; the in-memory value
    /// stays authoritative.
    ///
    /// # Errors
    /// Returns an error if the settings cannot be written to the store.
    pub fn save(&self, settings: Settings) -> Result<()> {
        let json = serde_json::to_string(&settings)?;
        self.tx.send_replace(settings);
        self.store.set(SETTINGS_KEY, &json)?;
        Ok(())
    }

    /// Update one field by key.
    ///
    /// # Errors
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the settings cannot be saved.
    pub fn update(&self, key: &str, value: &str) -> Result<Settings> {
        let updated = self.current().with_value(key, value)?;
        self.save(updated.clone())?;
        Ok(updated)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.tx.borrow().get(key)
    }

    /// # Errors
    /// Returns an error if the defaults cannot be saved.
    pub fn reset_to_defaults(&self) -> Result<()> {
        self.save(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn default_settings_roundtrip() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        assert!(json.contains("\"focusDuration\":1500"));
        assert!(json.contains("\"stepsMode\":\"4 steps\""));
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Settings::default());
    }

    #[test]
    fn lenient_load_merges_missing_fields() {
        let s = Settings::from_json_lenient(r#"{"focusDuration": 3000, "skip": "Auto"}"#);
        assert_eq!(s.focus_duration, 3000);
        assert_eq!(s.skip, SkipMode::Auto);
        assert_eq!(s.short_break_duration, 300);
        assert_eq!(s.theme, Theme::Light);
    }

    #[test]
    fn lenient_load_replaces_corrupt_fields_individually() {
        let s = Settings::from_json_lenient(
            r#"{"focusDuration": -5, "shortBreakDuration": "ten", "longBreakDuration": 600, "stepsMode": "99 steps", "sound": "Off"}"#,
        );
        assert_eq!(s.focus_duration, 1500);
        assert_eq!(s.short_break_duration, 300);
        assert_eq!(s.long_break_duration, 600);
        assert_eq!(s.steps_mode, StepsMode::FourSteps);
        assert_eq!(s.sound, SoundMode::Off);
    }

    #[test]
    fn lenient_load_survives_garbage() {
        assert_eq!(Settings::from_json_lenient("not json"), Settings::default());
        assert_eq!(Settings::from_json_lenient("[1,2]"), Settings::default());
        assert_eq!(
            Settings::from_json_lenient(r#"{"volume": 11}"#),
            Settings::default()
        );
    }

    #[test]
    fn get_returns_string_for_all_types() {
        let s = Settings::default();
        assert_eq!(s.get("focusDuration").as_deref(), Some("1500"));
        assert_eq!(s.get("skip").as_deref(), Some("Manual"));
        assert_eq!(s.get("stepsMode").as_deref(), Some("4 steps"));
        assert!(s.get("missingKey").is_none());
        assert!(s.get("").is_none());
    }

    #[test]
    fn with_value_parses_by_field_type() {
        let s = Settings::default();
        assert_eq!(s.with_value("longBreakDuration", "1200").unwrap().long_break_duration, 1200);
        assert_eq!(s.with_value("stepsMode", "8 steps").unwrap().steps_mode, StepsMode::EightSteps);
        assert_eq!(s.with_value("lofi", "On").unwrap().lofi, Toggle::On);
    }

    #[test]
    fn with_value_rejects_unknown_key_and_bad_values() {
        let s = Settings::default();
        assert!(matches!(
            s.with_value("nonexistent", "1"),
            Err(CoreError::Config(ConfigError::UnknownKey(_)))
        ));
        assert!(s.with_value("focusDuration", "-1").is_err());
        assert!(s.with_value("skip", "Sometimes").is_err());
    }

    #[test]
    fn store_persists_and_notifies() {
        let kv = MemoryStore::new();
        let store = SettingsStore::load(Arc::new(kv.clone()));
        let mut rx = store.subscribe();

        store.update("focusDuration", "1800").unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().focus_duration, 1800);

        let reloaded = SettingsStore::load(Arc::new(kv));
        assert_eq!(reloaded.current().focus_duration, 1800);
    }

    #[test]
    fn reset_to_defaults_overwrites_record() {
        let kv = MemoryStore::new();
        kv.set(SETTINGS_KEY, r#"{"skip":"Auto"}"#).unwrap();
        let store = SettingsStore::load(Arc::new(kv.clone()));
        assert_eq!(store.current().skip, SkipMode::Auto);
        store.reset_to_defaults().unwrap();
        assert_eq!(SettingsStore::load(Arc::new(kv)).current(), Settings::default());
    }
}
