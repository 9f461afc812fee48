use serde::{Deserialize, Serialize};

use crate::storage::Settings;

/// One interval type in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Work,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Work, Phase::ShortBreak, Phase::LongBreak];

    pub fn label(self) -> &'static str {
        match self {
            Phase::Work => "work",
            Phase::ShortBreak => "short_break",
            Phase::LongBreak => "long_break",
        }
    }

    /// Parse a phase label. Unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "work" => Some(Phase::Work),
            "short_break" => Some(Phase::ShortBreak),
            "long_break" => Some(Phase::LongBreak),
            _ => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Configured duration of `phase` in seconds.
///
/// `None` stands for a phase that could not be resolved (for example a step
/// index past the end of the scenario) and falls back to the work duration.
pub fn resolve_duration(phase: Option<Phase>, settings: &Settings) -> u64 {
    match phase.unwrap_or(Phase::Work) {
        Phase::Work => settings.focus_duration,
        Phase::ShortBreak => settings.short_break_duration,
        Phase::LongBreak => settings.long_break_duration,
    }
}
