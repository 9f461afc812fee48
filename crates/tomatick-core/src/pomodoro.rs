//! The assembled session core.
//!
//! [`Pomodoro`] owns the timer engine, the session recorder and the feedback
//! dispatcher, and routes every engine event to them. After each command the
//! engine state and (when it changed) the ledger are flushed to the
//! key-value store. Flush failures are logged; the in-memory state stays
//! authoritative.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoreError, ValidationError};
use crate::events::{Event, Snapshot};
use crate::feedback::{Cue, Feedback, FeedbackDispatcher};
use crate::stats::{DailyStats, Ledger, OpenSession, PhaseTotals, SessionRecorder, WeeklyStats};
use crate::storage::{load_ledger, save_ledger, KeyValueStore, Settings, Toggle};
use crate::timer::{Clock, Lifecycle, Phase, Scenario, SessionState, StepsMode, TimerEngine};

/// Key under which the engine state is persisted between processes.
pub const ENGINE_KEY: &str = "timer-engine";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedEngine {
    session: SessionState,
    #[serde(default)]
    open_session: Option<OpenSession>,
}

pub struct Pomodoro {
    engine: TimerEngine,
    recorder: SessionRecorder,
    feedback: FeedbackDispatcher,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl Pomodoro {
    /// Fresh session at step 1 over the ledger already in `store`.
    pub fn new(
        settings: Settings,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        feedback: Box<dyn Feedback>,
    ) -> Self {
        let scenario = settings.steps_mode.scenario();
        Self::with_scenario(scenario, settings, store, clock, feedback)
    }

    /// Fresh session over a custom phase sequence. Only a completed
    /// `long_break` counts as a cycle, so a sequence without one never
    /// increments the cycle counter.
    pub fn with_scenario(
        scenario: Scenario,
        settings: Settings,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        feedback: Box<dyn Feedback>,
    ) -> Self {
        let ledger = load_ledger(store.as_ref());
        Self {
            engine: TimerEngine::with_scenario(scenario, settings, clock.clone()),
            recorder: SessionRecorder::new(ledger, clock.clone()),
            feedback: FeedbackDispatcher::new(feedback),
            store,
            clock,
        }
    }

    /// Resume the session persisted in `store`, or start fresh if there is
    /// none or it cannot be decoded.
    pub fn load(
        settings: Settings,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        feedback: Box<dyn Feedback>,
    ) -> Self {
        let Some(persisted) = read_engine(store.as_ref()) else {
            return Self::new(settings, store, clock, feedback);
        };
        let ledger = load_ledger(store.as_ref());
        let mut core = Self {
            engine: TimerEngine::restore(persisted.session, settings.clone(), clock.clone()),
            recorder: SessionRecorder::new(ledger, clock.clone())
                .with_open_session(persisted.open_session),
            feedback: FeedbackDispatcher::new(feedback),
            store,
            clock,
        };
        // Completes a countdown that ran out while nothing was loaded, then
        // switches scenario if the settings moved on.
        core.apply_settings(settings);
        if core.engine.is_paused() && core.recorder.end_session().is_some() {
            core.flush_ledger();
        }
        core
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn settings(&self) -> &Settings {
        self.engine.settings()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.engine.snapshot()
    }

    pub fn step(&self) -> usize {
        self.engine.step()
    }

    pub fn phase(&self) -> Phase {
        self.engine.phase()
    }

    pub fn is_paused(&self) -> bool {
        self.engine.is_paused()
    }

    pub fn time_left_secs(&self) -> u64 {
        self.engine.time_left_secs()
    }

    pub fn generation(&self) -> u64 {
        self.engine.generation()
    }

    pub fn needs_ticks(&self) -> bool {
        self.engine.needs_ticks()
    }

    pub fn open_session(&self) -> Option<OpenSession> {
        self.recorder.open_session()
    }

    pub fn ledger(&self) -> &Ledger {
        self.recorder.ledger()
    }

    pub fn total_cycles(&self) -> u64 {
        self.recorder.total_cycles()
    }

    pub fn daily_data(&self, date: NaiveDate) -> DailyStats {
        self.ledger().daily_data(date)
    }

    /// Seven days of the week `offset` weeks from the current one.
    pub fn weekly_data(&self, offset: i64) -> WeeklyStats {
        self.ledger().weekly_data(self.clock.today(), offset)
    }

    pub fn weekly_time_by_phase(&self, offset: i64) -> PhaseTotals {
        self.ledger().weekly_time_by_phase(self.clock.today(), offset)
    }

    pub fn total_time_by_phase(&self) -> PhaseTotals {
        self.ledger().total_time_by_phase()
    }

    // ── Timer actions ────────────────────────────────────────────────

    pub fn toggle_pause(&mut self) -> Vec<Event> {
        let events = self.engine.toggle_pause();
        self.dispatch(events)
    }

    pub fn skip_to_next_phase(&mut self) -> Vec<Event> {
        let events = self.engine.skip_to_next_phase();
        self.dispatch(events)
    }

    pub fn reset_phase(&mut self) -> Vec<Event> {
        let events = self.engine.reset_phase();
        self.dispatch(events)
    }

    /// # Errors
    /// Returns an error if `step` is outside the active scenario.
    pub fn set_step(&mut self, step: usize) -> Result<Vec<Event>, ValidationError> {
        let events = self.engine.set_step(step)?;
        Ok(self.dispatch(events))
    }

    pub fn change_scenario(&mut self, mode: StepsMode) -> Vec<Event> {
        let events = self.engine.change_scenario(mode);
        self.dispatch(events)
    }

    pub fn tick(&mut self) -> Vec<Event> {
        let events = self.engine.tick();
        if events.is_empty() {
            return events;
        }
        self.dispatch(events)
    }

    pub fn on_lifecycle(&mut self, lifecycle: Lifecycle) -> Vec<Event> {
        let events = self.engine.on_lifecycle(lifecycle);
        let events = self.dispatch(events);
        if lifecycle == Lifecycle::Background {
            self.flush_ledger();
        }
        events
    }

    /// Apply settings delivered by the settings collaborator.
    pub fn apply_settings(&mut self, settings: Settings) -> Vec<Event> {
        if self.settings().lofi == Toggle::On && settings.lofi == Toggle::Off {
            self.feedback.stop_ambient();
        }
        let events = self.engine.apply_settings(settings);
        self.dispatch(events)
    }

    /// Tear the session down: pause a running countdown (closing its
    /// recorder session), drop any scheduled start and flush everything.
    pub fn shutdown(&mut self) -> Vec<Event> {
        let mut events = self.engine.pause();
        events.extend(self.engine.cancel_auto_start());
        let events = self.dispatch(events);
        self.flush_ledger();
        events
    }

    // ── Statistics actions ───────────────────────────────────────────

    /// Add minutes directly to the ledger; `date` defaults to today.
    pub fn log_time(&mut self, phase: Phase, minutes: u64, date: Option<NaiveDate>) {
        self.recorder.log_time(phase, minutes, date);
        self.flush_ledger();
    }

    pub fn reset_statistics(&mut self) {
        self.recorder.reset_statistics();
        self.flush_ledger();
        self.flush_engine();
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn dispatch(&mut self, events: Vec<Event>) -> Vec<Event> {
        let mut ledger_changed = false;
        for event in &events {
            ledger_changed |= self.record(event);
            if let Some(cue) = Cue::from_event(event) {
                self.feedback.cue(cue, self.engine.settings());
            }
        }
        if ledger_changed {
            self.flush_ledger();
        }
        self.flush_engine();
        events
    }

    /// Feed one engine event to the recorder. Returns whether the ledger
    /// changed.
    fn record(&mut self, event: &Event) -> bool {
        match event {
            Event::PhaseStarted { phase, .. } | Event::PhaseResumed { phase, .. } => {
                self.recorder.start_session(*phase);
                false
            }
            Event::PhaseCompleted {
                cycle_completed,
                at,
                ..
            } => {
                let ended_ms = u64::try_from(at.timestamp_millis()).unwrap_or_default();
                self.recorder.end_session_at(ended_ms);
                if *cycle_completed {
                    self.recorder.increment_cycles();
                }
                true
            }
            Event::PhasePaused { .. }
            | Event::PhaseSkipped { .. }
            | Event::PhaseReset { .. }
            | Event::ScenarioChanged { .. } => self.recorder.end_session().is_some(),
            _ => false,
        }
    }

    fn flush_ledger(&self) {
        if let Err(e) = save_ledger(self.store.as_ref(), self.recorder.ledger()) {
            warn!(error = %e, "failed to persist statistics ledger");
        }
    }

    fn flush_engine(&self) {
        let persisted = PersistedEngine {
            session: self.engine.state().clone(),
            open_session: self.recorder.open_session(),
        };
        let result = serde_json::to_string(&persisted)
            .map_err(CoreError::from)
            .and_then(|json| {
                self.store
                    .set(ENGINE_KEY, &json)
                    .map_err(CoreError::from)
            });
        match result {
            Ok(()) => debug!(step = self.engine.step(), "engine state persisted"),
            Err(e) => warn!(error = %e, "failed to persist engine state"),
        }
    }
}

fn read_engine(store: &dyn KeyValueStore) -> Option<PersistedEngine> {
    match store.get(ENGINE_KEY) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(persisted) => Some(persisted),
            Err(e) => {
                warn!(error = %e, "persisted engine state is corrupt, starting fresh");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "failed to read engine state, starting fresh");
            None
        }
    }
}
