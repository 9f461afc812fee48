use clap::Subcommand;
use tomatick_core::{Lifecycle, SettingsStore, StepsMode};

use super::{load_core, open_store, print_json};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print current timer state as JSON
    Status,
    /// Start, pause or resume the countdown
    Toggle,
    /// Skip to the next phase
    Skip,
    /// Restart the current phase from its full duration
    Reset,
    /// Jump to a step of the scenario (1-based)
    Step {
        step: usize,
    },
    /// Switch scenario ("4 steps" or "8 steps")
    Scenario {
        mode: StepsMode,
    },
    /// Recompute remaining time after the timer was away
    Foreground,
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store()?;
    let mut core = load_core(store.clone());

    let events = match action {
        TimerAction::Status => core.tick(),
        TimerAction::Toggle => core.toggle_pause(),
        TimerAction::Skip => core.skip_to_next_phase(),
        TimerAction::Reset => core.reset_phase(),
        TimerAction::Step { step } => core.set_step(step)?,
        TimerAction::Scenario { mode } => {
            // Persist the choice so the next run restores the same scenario.
            SettingsStore::load(store).update("stepsMode", mode.label())?;
            core.change_scenario(mode)
        }
        TimerAction::Foreground => core.on_lifecycle(Lifecycle::Foreground),
    };

    for event in &events {
        print_json(event)?;
    }
    print_json(&core.snapshot())
}
