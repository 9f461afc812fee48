//! Timer engine implementation.
//!
//! The engine is a wall-clock-based state machine over a single owned
//! [`SessionState`]. It does not use internal threads - the caller is
//! responsible for calling `tick()` periodically (see [`super::TimerDriver`]).
//!
//! ## State Transitions
//!
//! ```text
//! Paused --toggle--> Running --toggle--> Paused
//!                       |
//!                   remaining == 0
//!                       v
//!        advance + phase reset -> Paused [-> auto start after delay]
//! ```
//!
//! Every step change, scenario change and explicit reset performs a
//! *phase reset*: timestamps are cleared, the duration is re-resolved and the
//! engine is forced back to paused. Each reset or pause toggle bumps
//! `generation`, which drivers use to discard stale tick callbacks.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(settings, Arc::new(SystemClock));
//! engine.toggle_pause();
//! // Once a second:
//! for event in engine.tick() { /* PhaseCompleted, ... */ }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::clock::{format_time_left, Clock, ElapsedClock};
use super::phase::{resolve_duration, Phase};
use super::scenario::{Scenario, Sequencer, StepsMode};
use crate::error::ValidationError;
use crate::events::{Event, Snapshot};
use crate::storage::{Settings, SkipMode};

/// Delay between a completion and the auto-start of the next phase.
pub const AUTO_START_DELAY_MS: u64 = 1_000;

/// Window after a completion during which another completion is ignored.
pub const COMPLETION_COOLDOWN_MS: u64 = 1_000;

/// App-lifecycle transitions reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Foreground,
    Background,
}

/// Pending auto-start of the phase at `step`.
///
/// Any phase reset or manual pause toggle cancels it; a tick at or after
/// `due_ms` fires it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledStart {
    pub id: u64,
    pub step: usize,
    pub due_ms: u64,
}

/// The single mutable session record owned by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    sequencer: Sequencer,
    mode: StepsMode,
    is_paused: bool,
    clock: ElapsedClock,
    /// Derived for display; recomputed from `clock` on every tick.
    time_left_secs: u64,
    #[serde(default)]
    completion_guard_until_ms: Option<u64>,
    #[serde(default)]
    auto_start: Option<ScheduledStart>,
    #[serde(default)]
    generation: u64,
}

impl SessionState {
    pub fn step(&self) -> usize {
        self.sequencer.step()
    }

    pub fn phase(&self) -> Phase {
        self.sequencer.phase()
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn time_left_secs(&self) -> u64 {
        self.time_left_secs
    }

    pub fn start_ms(&self) -> Option<u64> {
        self.clock.start_ms()
    }

    pub fn accumulated_pause_ms(&self) -> u64 {
        self.clock.accumulated_pause_ms()
    }
}

/// Core countdown/session engine.
pub struct TimerEngine {
    state: SessionState,
    settings: Settings,
    clock: Arc<dyn Clock>,
}

impl TimerEngine {
    /// Create an engine at step 1, paused, using the scenario selected by
    /// `settings.steps_mode`.
    pub fn new(settings: Settings, clock: Arc<dyn Clock>) -> Self {
        Self::with_scenario(settings.steps_mode.scenario(), settings, clock)
    }

    /// Create an engine over a custom scenario.
    pub fn with_scenario(scenario: Scenario, settings: Settings, clock: Arc<dyn Clock>) -> Self {
        let sequencer = Sequencer::new(scenario);
        let duration = resolve_duration(sequencer.scenario().phase_at(1), &settings);
        Self {
            state: SessionState {
                sequencer,
                mode: settings.steps_mode,
                is_paused: true,
                clock: ElapsedClock::new(duration),
                time_left_secs: duration,
                completion_guard_until_ms: None,
                auto_start: None,
                generation: 0,
            },
            settings,
            clock,
        }
    }

    /// Rebuild an engine from a persisted session record.
    ///
    /// The session keeps the scenario it was persisted with even if
    /// `settings.steps_mode` names another one; pass the live settings to
    /// [`TimerEngine::apply_settings`] afterwards to switch over.
    pub fn restore(state: SessionState, mut settings: Settings, clock: Arc<dyn Clock>) -> Self {
        settings.steps_mode = state.mode;
        let mut engine = Self {
            state,
            settings,
            clock,
        };
        engine.reload_unstarted_duration();
        let now = engine.clock.now_ms();
        engine.recompute(now);
        engine
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn step(&self) -> usize {
        self.state.step()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn scenario(&self) -> &Scenario {
        self.state.sequencer.scenario()
    }

    pub fn steps_mode(&self) -> StepsMode {
        self.state.mode
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused
    }

    pub fn time_left_secs(&self) -> u64 {
        self.state.time_left_secs
    }

    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    pub fn auto_start(&self) -> Option<ScheduledStart> {
        self.state.auto_start
    }

    /// Whether a periodic tick currently has any work to do.
    pub fn needs_ticks(&self) -> bool {
        !self.state.is_paused || self.state.auto_start.is_some()
    }

    pub fn snapshot(&self) -> Snapshot {
        let secs = self.state.time_left_secs;
        Snapshot {
            step: self.step(),
            scenario_len: self.scenario().len(),
            phase: self.phase(),
            is_paused: self.state.is_paused,
            time_left_secs: secs,
            minutes: secs / 60,
            seconds: secs % 60,
            display: format_time_left(secs),
            auto_start_pending: self.state.auto_start.is_some(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn toggle_pause(&mut self) -> Vec<Event> {
        if self.state.is_paused {
            self.start().into_iter().collect()
        } else {
            self.pause()
        }
    }

    /// Paused -> running. `None` if already running.
    pub fn start(&mut self) -> Option<Event> {
        if !self.state.is_paused {
            return None;
        }
        let now = self.clock.now_ms();
        if let Some(pending) = self.state.auto_start.take() {
            debug!(id = pending.id, "manual start supersedes scheduled start");
        }
        let fresh = self.state.clock.run(now);
        self.state.is_paused = false;
        self.state.generation += 1;
        self.recompute(now);

        let at = at(now);
        let (step, phase) = (self.step(), self.phase());
        if fresh {
            debug!(step, %phase, "phase started");
            Some(Event::PhaseStarted {
                step,
                phase,
                duration_secs: self.state.clock.duration_secs(),
                at,
            })
        } else {
            debug!(step, %phase, "phase resumed");
            Some(Event::PhaseResumed {
                step,
                phase,
                remaining_secs: self.state.time_left_secs,
                at,
            })
        }
    }

    /// Running -> paused. Also cancels a pending auto-start.
    ///
    /// A countdown that already ran out completes first; the pause then
    /// only cancels the scheduled start of the next phase.
    pub fn pause(&mut self) -> Vec<Event> {
        let now = self.clock.now_ms();
        let mut events = self.settle(now);
        if self.state.is_paused {
            events.extend(self.cancel_auto_start());
            return events;
        }
        self.state.clock.pause(now);
        self.state.is_paused = true;
        self.state.generation += 1;
        debug!(step = self.step(), remaining = self.state.time_left_secs, "phase paused");
        events.push(Event::PhasePaused {
            step: self.step(),
            phase: self.phase(),
            remaining_secs: self.state.time_left_secs,
            at: at(now),
        });
        events
    }

    /// Manual skip: advance exactly one step (wrapping) and reset.
    ///
    /// If the countdown already ran out, its completion has advanced the
    /// step and stands in for the skip.
    pub fn skip_to_next_phase(&mut self) -> Vec<Event> {
        let now = self.clock.now_ms();
        let events = self.settle(now);
        if events
            .iter()
            .any(|event| matches!(event, Event::PhaseCompleted { .. }))
        {
            return events;
        }
        let from_step = self.step();
        let to_step = self.state.sequencer.advance();
        self.phase_reset(now);
        vec![Event::PhaseSkipped {
            from_step,
            to_step,
            phase: self.phase(),
            at: at(now),
        }]
    }

    /// Re-run the phase reset without moving the step.
    pub fn reset_phase(&mut self) -> Vec<Event> {
        let now = self.clock.now_ms();
        let mut events = self.settle(now);
        events.push(self.reset_current(now));
        events
    }

    /// Jump to a 1-based step.
    ///
    /// # Errors
    /// Returns an error if `step` is outside the active scenario.
    pub fn set_step(&mut self, step: usize) -> Result<Vec<Event>, ValidationError> {
        self.state.sequencer.check_step(step)?;
        let now = self.clock.now_ms();
        let mut events = self.settle(now);
        self.state.sequencer.set_step(step)?;
        events.push(self.reset_current(now));
        Ok(events)
    }

    /// Switch to another built-in scenario: step 1, paused, countdown cleared.
    pub fn change_scenario(&mut self, mode: StepsMode) -> Vec<Event> {
        let now = self.clock.now_ms();
        let mut events = self.settle(now);
        self.state.sequencer.change_scenario(mode.scenario());
        self.state.mode = mode;
        self.settings.steps_mode = mode;
        self.phase_reset(now);
        info!(mode = mode.label(), "scenario changed");
        events.push(Event::ScenarioChanged {
            mode,
            steps: self.scenario().len(),
            at: at(now),
        });
        events
    }

    /// Apply updated settings from the settings collaborator.
    ///
    /// A `steps_mode` change resets to step 1. Duration changes take effect
    /// immediately only while the current phase has not been started;
    /// otherwise at the next phase reset.
    pub fn apply_settings(&mut self, settings: Settings) -> Vec<Event> {
        let mode_changed = settings.steps_mode != self.state.mode;
        let now = self.clock.now_ms();
        let mut events = self.settle(now);
        self.settings = settings;
        if mode_changed {
            events.extend(self.change_scenario(self.settings.steps_mode));
            return events;
        }
        self.reload_unstarted_duration();
        events
    }

    /// Cancel a pending auto-start, if any.
    pub fn cancel_auto_start(&mut self) -> Option<Event> {
        let pending = self.state.auto_start.take()?;
        debug!(id = pending.id, "scheduled start cancelled");
        Some(Event::AutoStartCancelled {
            step: pending.step,
            at: self.clock.now_utc(),
        })
    }

    /// Periodic callback. Recomputes remaining time from absolute timestamps,
    /// fires a due auto-start and detects completion.
    pub fn tick(&mut self) -> Vec<Event> {
        let now = self.clock.now_ms();
        let mut events = Vec::new();

        if self.state.is_paused {
            if let Some(event) = self.fire_due_auto_start(now) {
                events.push(event);
            }
        }
        events.extend(self.settle(now));
        events
    }

    /// React to an app-lifecycle transition. Returning to the foreground
    /// recomputes immediately instead of waiting for the next tick.
    pub fn on_lifecycle(&mut self, lifecycle: Lifecycle) -> Vec<Event> {
        match lifecycle {
            Lifecycle::Background => {
                debug!(step = self.step(), paused = self.state.is_paused, "backgrounded");
                Vec::new()
            }
            Lifecycle::Foreground => {
                let mut events = self.tick();
                events.push(Event::Foregrounded {
                    remaining_secs: self.state.time_left_secs,
                    at: self.clock.now_utc(),
                });
                events
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn current_duration(&self) -> u64 {
        resolve_duration(self.scenario().phase_at(self.step()), &self.settings)
    }

    fn reload_unstarted_duration(&mut self) {
        if self.state.clock.is_started() {
            return;
        }
        let duration = self.current_duration();
        if duration != self.state.clock.duration_secs() {
            self.state.clock.reset(duration);
            self.state.time_left_secs = duration;
        }
    }

    fn recompute(&mut self, now: u64) {
        self.state.time_left_secs = self.state.clock.remaining_secs(now);
    }

    /// Complete a running countdown that has reached zero. Every command
    /// calls this before acting.
    fn settle(&mut self, now: u64) -> Vec<Event> {
        if self.state.is_paused {
            return Vec::new();
        }
        self.recompute(now);
        if self.state.time_left_secs > 0 {
            return Vec::new();
        }
        self.complete(now)
    }

    fn reset_current(&mut self, now: u64) -> Event {
        self.phase_reset(now);
        Event::PhaseReset {
            step: self.step(),
            phase: self.phase(),
            duration_secs: self.state.clock.duration_secs(),
            at: at(now),
        }
    }

    fn phase_reset(&mut self, now: u64) {
        let duration = self.current_duration();
        self.state.clock.reset(duration);
        self.state.time_left_secs = duration;
        self.state.is_paused = true;
        self.state.generation += 1;
        if let Some(pending) = self.state.auto_start.take() {
            debug!(id = pending.id, at = now, "phase reset cancelled scheduled start");
        }
    }

    fn fire_due_auto_start(&mut self, now: u64) -> Option<Event> {
        let pending = self.state.auto_start?;
        if now < pending.due_ms {
            return None;
        }
        if pending.step != self.step() {
            warn!(id = pending.id, "dropping scheduled start for a stale step");
            self.state.auto_start = None;
            return None;
        }
        self.state.auto_start = None;
        debug!(id = pending.id, "scheduled start fired");
        self.start()
    }

    fn complete(&mut self, now: u64) -> Vec<Event> {
        if let Some(until) = self.state.completion_guard_until_ms {
            if now < until {
                warn!(step = self.step(), "completion ignored during cooldown");
                return Vec::new();
            }
        }
        self.state.completion_guard_until_ms = Some(now + COMPLETION_COOLDOWN_MS);

        // A completion observed late (after a suspension) is dated to when
        // the countdown actually hit zero.
        let ended_ms = self.state.clock.due_ms().map_or(now, |due| due.min(now));
        let step = self.step();
        let phase = self.phase();
        let next_step = self.state.sequencer.advance();
        self.phase_reset(now);
        let next_phase = self.phase();
        let cycle_completed = phase == Phase::LongBreak;
        info!(step, %phase, next_step, %next_phase, cycle_completed, "phase completed");

        let mut events = vec![Event::PhaseCompleted {
            step,
            phase,
            next_step,
            next_phase,
            cycle_completed,
            at: at(ended_ms),
        }];

        if self.settings.skip == SkipMode::Auto {
            let scheduled = ScheduledStart {
                id: self.state.generation,
                step: next_step,
                due_ms: now + AUTO_START_DELAY_MS,
            };
            self.state.auto_start = Some(scheduled);
            events.push(Event::AutoStartScheduled {
                step: next_step,
                phase: next_phase,
                due_at: at(scheduled.due_ms),
            });
        }
        events
    }
}

fn at(epoch_ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(epoch_ms as i64).unwrap_or_default()
}
