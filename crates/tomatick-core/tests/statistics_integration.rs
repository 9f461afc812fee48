//! Integration tests for the statistics ledger and its aggregates.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tomatick_core::storage::{load_ledger, MemoryStore, STATISTICS_KEY};
use tomatick_core::{KeyValueStore, ManualClock, Phase, Pomodoro, Settings, SilentFeedback};

fn thursday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 9).unwrap()
}

fn core_on(store: &MemoryStore, clock: &ManualClock) -> Pomodoro {
    Pomodoro::load(
        Settings::default(),
        Arc::new(store.clone()),
        Arc::new(clock.clone()),
        Box::new(SilentFeedback),
    )
}

#[test]
fn test_ledger_additivity() {
    let store = MemoryStore::new();
    let clock = ManualClock::at_local(thursday(), 12 * 3_600_000);
    let mut core = core_on(&store, &clock);
    let d = thursday() - Duration::days(1);

    core.log_time(Phase::Work, 25, Some(d));
    core.log_time(Phase::Work, 25, Some(d));

    let day = core.daily_data(d);
    assert_eq!((day.work, day.short_break, day.long_break), (50, 0, 0));
}

#[test]
fn test_weekly_data_spans_monday_to_sunday() {
    let store = MemoryStore::new();
    let clock = ManualClock::at_local(thursday(), 12 * 3_600_000);
    let mut core = core_on(&store, &clock);
    core.log_time(Phase::ShortBreak, 5, None);

    let week = core.weekly_data(0);
    assert_eq!(week.days.len(), 7);
    assert_eq!(week.days[0].date, NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
    assert_eq!(week.days[6].date, NaiveDate::from_ymd_opt(2024, 5, 12).unwrap());
    assert_eq!(week.days[3].short_break, 5);
    assert!(week
        .days
        .iter()
        .enumerate()
        .all(|(i, d)| i == 3 || d.total() == 0));
}

#[test]
fn test_weekly_totals_by_offset() {
    let store = MemoryStore::new();
    let clock = ManualClock::at_local(thursday(), 12 * 3_600_000);
    let mut core = core_on(&store, &clock);
    core.log_time(Phase::Work, 50, None);
    core.log_time(Phase::LongBreak, 15, Some(thursday() - Duration::days(7)));

    let this_week = core.weekly_time_by_phase(0);
    assert_eq!((this_week.work, this_week.long_break), (50, 0));
    let last_week = core.weekly_time_by_phase(-1);
    assert_eq!((last_week.work, last_week.long_break), (0, 15));
    assert_eq!(core.total_time_by_phase().total(), 65);
}

#[test]
fn test_session_attributed_to_day_it_ends() {
    let store = MemoryStore::new();
    // 23:50 local on Thursday.
    let clock = ManualClock::at_local(thursday(), (23 * 60 + 50) * 60_000);
    let mut core = core_on(&store, &clock);
    core.toggle_pause();
    clock.advance_secs(20 * 60);
    core.toggle_pause();

    let friday = thursday() + Duration::days(1);
    assert_eq!(core.daily_data(friday).work, 20);
    assert_eq!(core.daily_data(thursday()).work, 0);
}

#[test]
fn test_corrupt_ledger_is_reinitialized() {
    let store = MemoryStore::new();
    store.set(STATISTICS_KEY, "{{{").unwrap();
    let clock = ManualClock::at_local(thursday(), 0);
    let mut core = core_on(&store, &clock);
    assert!(core.ledger().is_empty());

    core.log_time(Phase::Work, 10, None);
    assert_eq!(load_ledger(&store).daily_data(thursday()).work, 10);
}

#[test]
fn test_reset_statistics() {
    let store = MemoryStore::new();
    let clock = ManualClock::at_local(thursday(), 0);
    let mut core = core_on(&store, &clock);
    for _ in 0..4 {
        core.toggle_pause();
        clock.advance_secs(core.time_left_secs());
        core.tick();
        clock.advance_secs(1);
    }
    assert_eq!(core.total_cycles(), 1);

    core.reset_statistics();
    assert_eq!(core.total_cycles(), 0);
    assert!(core.ledger().is_empty());
    let reloaded = core_on(&store, &clock);
    assert_eq!(reloaded.total_cycles(), 0);
}
