//! # Tomatick Core Library
//!
//! This library provides the session engine for the Tomatick Pomodoro timer.
//! Everything is usable from the standalone `tomatick` CLI; any GUI is a thin
//! layer over the same core.
//!
//! ## Architecture
//!
//! - **Timer**: a wall-clock-based state machine. Remaining time is always
//!   derived from absolute timestamps, so missed ticks and app suspension
//!   never cause drift. The caller drives `tick()`, either by hand or through
//!   the async [`TimerDriver`].
//! - **Stats**: per-day, per-phase minute ledger fed by the session recorder,
//!   plus weekly and lifetime aggregates.
//! - **Storage**: key-value persistence (SQLite or in-memory) for settings,
//!   the ledger and the engine state.
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: countdown and phase sequencing
//! - [`Pomodoro`]: engine + recorder + feedback + persistence, wired together
//! - [`SettingsStore`]: user settings with change notification
//! - [`Database`]: SQLite key-value store

pub mod error;
pub mod events;
pub mod feedback;
pub mod pomodoro;
pub mod stats;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, FeedbackError, StorageError, ValidationError};
pub use events::{Event, Snapshot};
pub use feedback::{Feedback, FeedbackDispatcher, HapticKind, SilentFeedback, SoundId};
pub use pomodoro::{Pomodoro, ENGINE_KEY};
pub use stats::{DailyStats, Ledger, PhaseTotals, SessionRecorder, WeeklyStats};
pub use storage::{Database, KeyValueStore, MemoryStore, Settings, SettingsStore};
pub use timer::{
    format_time_left, Clock, Lifecycle, ManualClock, Phase, Scenario, StepsMode, SystemClock,
    TimerDriver, TimerEngine,
};
