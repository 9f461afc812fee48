//! Async driver for the session core.
//!
//! Owns the [`Pomodoro`] behind a `tokio` mutex and runs the single
//! repeating tick. The ticker is aborted and respawned after every command;
//! each ticker also remembers the engine generation it was spawned for and
//! stops as soon as it sees a different one, so a stale tick can never land
//! in a newer phase.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use super::engine::Lifecycle;
use super::scenario::StepsMode;
use crate::error::ValidationError;
use crate::events::{Event, Snapshot};
use crate::pomodoro::Pomodoro;
use crate::storage::Settings;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

const EVENT_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct TimerDriver {
    core: Arc<Mutex<Pomodoro>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    settings_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    snapshots: Arc<watch::Sender<Snapshot>>,
    events: broadcast::Sender<Event>,
    tick_interval: Duration,
}

impl TimerDriver {
    pub fn new(core: Pomodoro) -> Self {
        Self::with_tick_interval(core, TICK_INTERVAL)
    }

    pub fn with_tick_interval(core: Pomodoro, tick_interval: Duration) -> Self {
        let (snapshots, _) = watch::channel(core.snapshot());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            core: Arc::new(Mutex::new(core)),
            ticker: Arc::new(Mutex::new(None)),
            settings_task: Arc::new(Mutex::new(None)),
            snapshots: Arc::new(snapshots),
            events,
            tick_interval,
        }
    }

    /// Start ticking if the restored session is running or has a pending
    /// scheduled start.
    pub async fn resume(&self) {
        let core = self.core.lock().await;
        self.reschedule(&core).await;
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.core.lock().await.snapshot()
    }

    /// Run a read-only query against the core.
    pub async fn with_core<T>(&self, f: impl FnOnce(&Pomodoro) -> T) -> T {
        let core = self.core.lock().await;
        f(&core)
    }

    pub async fn is_ticking(&self) -> bool {
        self.ticker
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn toggle_pause(&self) -> Vec<Event> {
        self.apply(Pomodoro::toggle_pause).await
    }

    pub async fn skip_to_next_phase(&self) -> Vec<Event> {
        self.apply(Pomodoro::skip_to_next_phase).await
    }

    pub async fn reset_phase(&self) -> Vec<Event> {
        self.apply(Pomodoro::reset_phase).await
    }

    pub async fn change_scenario(&self, mode: StepsMode) -> Vec<Event> {
        self.apply(|core| core.change_scenario(mode)).await
    }

    /// # Errors
    /// Returns an error if `step` is outside the active scenario.
    pub async fn set_step(&self, step: usize) -> Result<Vec<Event>, ValidationError> {
        let mut core = self.core.lock().await;
        let events = core.set_step(step)?;
        self.after_command(&core, &events).await;
        Ok(events)
    }

    pub async fn apply_settings(&self, settings: Settings) -> Vec<Event> {
        self.apply(|core| core.apply_settings(settings)).await
    }

    /// Backgrounding stops the ticker; foregrounding recomputes from the
    /// wall clock and restarts it if needed.
    pub async fn on_lifecycle(&self, lifecycle: Lifecycle) -> Vec<Event> {
        let mut core = self.core.lock().await;
        let events = core.on_lifecycle(lifecycle);
        publish(&self.snapshots, &self.events, &core, &events);
        match lifecycle {
            Lifecycle::Background => self.cancel_ticker().await,
            Lifecycle::Foreground => self.reschedule(&core).await,
        }
        events
    }

    /// Forward every settings change to the core until the sender is dropped
    /// or the driver shuts down.
    pub async fn watch_settings(&self, mut rx: watch::Receiver<Settings>) {
        let driver = self.clone();
        let handle = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let settings = rx.borrow_and_update().clone();
                debug!("settings changed");
                driver.apply_settings(settings).await;
            }
        });
        if let Some(previous) = self.settings_task.lock().await.replace(handle) {
            previous.abort();
        }
    }

    /// Unmount: stop all tasks, close the open session and flush.
    pub async fn shutdown(&self) -> Vec<Event> {
        if let Some(handle) = self.settings_task.lock().await.take() {
            handle.abort();
        }
        self.cancel_ticker().await;
        let mut core = self.core.lock().await;
        let events = core.shutdown();
        publish(&self.snapshots, &self.events, &core, &events);
        events
    }

    async fn apply<F>(&self, f: F) -> Vec<Event>
    where
        F: FnOnce(&mut Pomodoro) -> Vec<Event>,
    {
        let mut core = self.core.lock().await;
        let events = f(&mut core);
        self.after_command(&core, &events).await;
        events
    }

    async fn after_command(&self, core: &Pomodoro, events: &[Event]) {
        publish(&self.snapshots, &self.events, core, events);
        self.reschedule(core).await;
    }

    async fn reschedule(&self, core: &Pomodoro) {
        if core.needs_ticks() {
            self.spawn_ticker(core.generation()).await;
        } else {
            self.cancel_ticker().await;
        }
    }

    async fn spawn_ticker(&self, generation: u64) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let core = self.core.clone();
        let snapshots = self.snapshots.clone();
        let events = self.events.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut expected = generation;
            loop {
                interval.tick().await;

                let mut guard = core.lock().await;
                if guard.generation() != expected {
                    debug!(expected, actual = guard.generation(), "stale ticker stopped");
                    break;
                }
                let tick_events = guard.tick();
                // Transitions caused by this tick (completion, scheduled
                // start) belong to this ticker.
                expected = guard.generation();
                publish(&snapshots, &events, &guard, &tick_events);
                if !guard.needs_ticks() {
                    break;
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }
}

fn publish(
    snapshots: &watch::Sender<Snapshot>,
    events: &broadcast::Sender<Event>,
    core: &Pomodoro,
    emitted: &[Event],
) {
    for event in emitted {
        // No subscribers is fine.
        let _ = events.send(event.clone());
    }
    snapshots.send_replace(core.snapshot());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::SilentFeedback;
    use crate::storage::{MemoryStore, SettingsStore, SkipMode};
    use crate::timer::{ManualClock, Phase};
    use crate::timer::clock::Clock;

    const T0: u64 = 1_700_000_000_000;

    fn driver_with(settings: Settings) -> (TimerDriver, ManualClock) {
        let clock = ManualClock::new(T0);
        let core = Pomodoro::new(
            settings,
            Arc::new(MemoryStore::new()),
            Arc::new(clock.clone()),
            Box::new(SilentFeedback),
        );
        (TimerDriver::new(core), clock)
    }

    async fn next_event(rx: &mut broadcast::Receiver<Event>) -> Event {
        time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_runs_only_while_running() {
        let (driver, _) = driver_with(Settings::default());
        assert!(!driver.is_ticking().await);
        driver.toggle_pause().await;
        assert!(driver.is_ticking().await);
        driver.toggle_pause().await;
        assert!(!driver.is_ticking().await);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_publish_recomputed_snapshots() {
        let (driver, clock) = driver_with(Settings::default());
        let mut snapshots = driver.subscribe_snapshots();
        driver.toggle_pause().await;
        clock.advance_secs(90);
        time::sleep(Duration::from_millis(1500)).await;
        let snap = snapshots.borrow_and_update().clone();
        assert_eq!(snap.time_left_secs, 1410);
        assert_eq!(snap.display, "23:30");
        assert!(!snap.is_paused);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_completes_phase_and_stops() {
        let (driver, clock) = driver_with(Settings::default());
        let mut events = driver.subscribe_events();
        driver.toggle_pause().await;
        assert!(matches!(next_event(&mut events).await, Event::PhaseStarted { .. }));

        clock.advance_secs(1500);
        match next_event(&mut events).await {
            Event::PhaseCompleted { next_phase, .. } => assert_eq!(next_phase, Phase::ShortBreak),
            other => panic!("Expected PhaseCompleted, got {other:?}"),
        }
        time::sleep(Duration::from_secs(3)).await;
        assert!(!driver.is_ticking().await);
        let snap = driver.snapshot().await;
        assert_eq!((snap.step, snap.is_paused, snap.time_left_secs), (2, true, 300));
    }

    #[tokio::test(start_paused = true)]
    async fn auto_skip_keeps_ticking_into_next_phase() {
        let settings = Settings {
            skip: SkipMode::Auto,
            ..Settings::default()
        };
        let (driver, clock) = driver_with(settings);
        let mut events = driver.subscribe_events();
        driver.toggle_pause().await;
        next_event(&mut events).await;

        clock.advance_secs(1500);
        assert!(matches!(next_event(&mut events).await, Event::PhaseCompleted { .. }));
        assert!(matches!(
            next_event(&mut events).await,
            Event::AutoStartScheduled { step: 2, .. }
        ));
        clock.advance_secs(1);
        assert!(matches!(
            next_event(&mut events).await,
            Event::PhaseStarted { phase: Phase::ShortBreak, .. }
        ));
        assert!(driver.is_ticking().await);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_cancels_running_ticker() {
        let (driver, clock) = driver_with(Settings::default());
        driver.toggle_pause().await;
        clock.advance_secs(30);
        driver.skip_to_next_phase().await;
        assert!(!driver.is_ticking().await);
        clock.advance_secs(600);
        time::sleep(Duration::from_secs(5)).await;
        let snap = driver.snapshot().await;
        assert_eq!((snap.step, snap.time_left_secs), (2, 300));
    }

    #[tokio::test(start_paused = true)]
    async fn background_stops_ticker_and_foreground_recomputes() {
        let (driver, clock) = driver_with(Settings::default());
        driver.toggle_pause().await;
        clock.advance_secs(1100);
        driver.on_lifecycle(Lifecycle::Background).await;
        assert!(!driver.is_ticking().await);

        clock.advance_secs(300);
        driver.on_lifecycle(Lifecycle::Foreground).await;
        assert_eq!(driver.snapshot().await.time_left_secs, 100);
        assert!(driver.is_ticking().await);
    }

    #[tokio::test(start_paused = true)]
    async fn settings_changes_reach_the_engine() {
        let (driver, _) = driver_with(Settings::default());
        let settings = SettingsStore::load(Arc::new(MemoryStore::new()));
        let mut events = driver.subscribe_events();
        driver.watch_settings(settings.subscribe()).await;
        driver.set_step(3).await.unwrap();
        assert!(matches!(next_event(&mut events).await, Event::PhaseReset { step: 3, .. }));

        settings.update("stepsMode", "8 steps").unwrap();
        match next_event(&mut events).await {
            Event::ScenarioChanged { mode, steps, .. } => {
                assert_eq!(mode, StepsMode::EightSteps);
                assert_eq!(steps, 8);
            }
            other => panic!("Expected ScenarioChanged, got {other:?}"),
        }
        let snap = driver.snapshot().await;
        assert_eq!((snap.step, snap.scenario_len, snap.is_paused), (1, 8, true));
    }

    #[tokio::test(start_paused = true)]
    async fn set_step_rejects_out_of_range() {
        let (driver, _) = driver_with(Settings::default());
        assert!(driver.set_step(5).await.is_err());
        assert!(driver.set_step(0).await.is_err());
        assert_eq!(driver.snapshot().await.step, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_pauses_running_session() {
        let (driver, clock) = driver_with(Settings::default());
        driver.toggle_pause().await;
        clock.advance_secs(120);
        let events = driver.shutdown().await;
        assert!(matches!(
            events.first(),
            Some(Event::PhasePaused { remaining_secs: 1380, .. })
        ));
        assert!(!driver.is_ticking().await);
        let today = clock.today();
        let minutes = driver.with_core(|core| core.daily_data(today).work).await;
        assert_eq!(minutes, 2);
    }
}
