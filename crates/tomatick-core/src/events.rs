use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Phase, StepsMode};

/// Every state change in the engine produces an Event.
/// Presentation layers subscribe to them; the facade feeds them to the
/// session recorder and the feedback dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Event {
    /// Countdown started fresh for the current phase.
    PhaseStarted {
        step: usize,
        phase: Phase,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    PhasePaused {
        step: usize,
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    PhaseResumed {
        step: usize,
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// The countdown reached zero and the sequencer advanced.
    PhaseCompleted {
        step: usize,
        phase: Phase,
        next_step: usize,
        next_phase: Phase,
        /// True when the finished phase was a long break.
        cycle_completed: bool,
        /// When the countdown reached zero, which may precede the tick that
        /// observed it.
        at: DateTime<Utc>,
    },
    PhaseSkipped {
        from_step: usize,
        to_step: usize,
        phase: Phase,
        at: DateTime<Utc>,
    },
    /// Countdown cleared and reloaded without moving the step.
    PhaseReset {
        step: usize,
        phase: Phase,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    ScenarioChanged {
        mode: StepsMode,
        steps: usize,
        at: DateTime<Utc>,
    },
    /// Auto-skip armed: the next phase starts at `due_at` unless cancelled.
    AutoStartScheduled {
        step: usize,
        phase: Phase,
        due_at: DateTime<Utc>,
    },
    AutoStartCancelled {
        step: usize,
        at: DateTime<Utc>,
    },
    /// Remaining time recomputed after the app came back to the foreground.
    Foregrounded {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot(Snapshot),
}

/// Observable view of the session for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub step: usize,
    pub scenario_len: usize,
    pub phase: Phase,
    pub is_paused: bool,
    pub time_left_secs: u64,
    pub minutes: u64,
    pub seconds: u64,
    /// `MM:SS`
    pub display: String,
    pub auto_start_pending: bool,
}
