//! Wall-clock time sources and the elapsed-time countdown.
//!
//! Remaining time is always derived from absolute timestamps:
//!
//! ```text
//! remaining = max(0, duration - floor((now - start - paused) / 1000))
//! ```
//!
//! A missed tick, or a process suspended for an hour, therefore costs
//! nothing: the next computation sees the real `now`. Epoch milliseconds are
//! used rather than a monotonic `Instant` because monotonic clocks stop while
//! the device sleeps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;

    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_ms() as i64).unwrap_or_default()
    }

    /// Local calendar date of `now`.
    fn today(&self) -> NaiveDate {
        local_date(self.now_ms())
    }
}

/// Local calendar date of an epoch-millisecond timestamp.
pub fn local_date(epoch_ms: u64) -> NaiveDate {
    Local
        .timestamp_millis_opt(epoch_ms as i64)
        .single()
        .map(|dt| dt.date_naive())
        .unwrap_or_else(|| Utc::now().date_naive())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Hand-driven clock. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Start at local midnight of `date` plus `offset_ms`.
    pub fn at_local(date: NaiveDate, offset_ms: u64) -> Self {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
            .map(|dt| dt.timestamp_millis() as u64)
            .unwrap_or_default();
        Self::new(midnight + offset_ms)
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs * 1000);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Countdown for a single phase, computed from absolute timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElapsedClock {
    duration_secs: u64,
    /// When the countdown was first started since the last reset.
    start_ms: Option<u64>,
    /// Total time spent paused since `start_ms`.
    accumulated_pause_ms: u64,
    /// Set while paused after having been started.
    pause_started_ms: Option<u64>,
}

impl ElapsedClock {
    pub fn new(duration_secs: u64) -> Self {
        Self {
            duration_secs,
            start_ms: None,
            accumulated_pause_ms: 0,
            pause_started_ms: None,
        }
    }

    /// Clear all timestamps and load a fresh duration.
    pub fn reset(&mut self, duration_secs: u64) {
        *self = Self::new(duration_secs);
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn start_ms(&self) -> Option<u64> {
        self.start_ms
    }

    pub fn accumulated_pause_ms(&self) -> u64 {
        self.accumulated_pause_ms
    }

    pub fn is_started(&self) -> bool {
        self.start_ms.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.start_ms.is_some() && self.pause_started_ms.is_none()
    }

    /// Paused -> running. Returns `true` when this started a fresh countdown
    /// rather than resuming a paused one.
    pub fn run(&mut self, now_ms: u64) -> bool {
        match (self.start_ms, self.pause_started_ms.take()) {
            (None, _) => {
                self.start_ms = Some(now_ms);
                self.accumulated_pause_ms = 0;
                true
            }
            (Some(_), Some(paused_at)) => {
                self.accumulated_pause_ms = self
                    .accumulated_pause_ms
                    .saturating_add(now_ms.saturating_sub(paused_at));
                false
            }
            (Some(_), None) => false,
        }
    }

    /// Running -> paused. No-op unless running.
    pub fn pause(&mut self, now_ms: u64) {
        if self.is_running() {
            self.pause_started_ms = Some(now_ms);
        }
    }

    /// Milliseconds of running time accrued at `now_ms`.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        let Some(start) = self.start_ms else {
            return 0;
        };
        let effective_now = self.pause_started_ms.unwrap_or(now_ms);
        effective_now
            .saturating_sub(start)
            .saturating_sub(self.accumulated_pause_ms)
    }

    /// Wall-clock instant at which a running countdown reaches zero.
    pub fn due_ms(&self) -> Option<u64> {
        if !self.is_running() {
            return None;
        }
        let start = self.start_ms?;
        Some(
            start
                .saturating_add(self.accumulated_pause_ms)
                .saturating_add(self.duration_secs.saturating_mul(1000)),
        )
    }

    pub fn remaining_secs(&self, now_ms: u64) -> u64 {
        self.duration_secs
            .saturating_sub(self.elapsed_ms(now_ms) / 1000)
    }
}

/// `MM:SS` rendering of a remaining-seconds value.
pub fn format_time_left(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_700_000_000_000;

    #[test]
    fn unstarted_clock_reports_full_duration() {
        let clock = ElapsedClock::new(1500);
        assert_eq!(clock.remaining_secs(T0 + 999_999), 1500);
        assert!(!clock.is_started());
    }

    #[test]
    fn pause_interval_is_not_counted() {
        let mut clock = ElapsedClock::new(1500);
        assert!(clock.run(T0));
        clock.pause(T0 + 10_000);
        assert_eq!(clock.remaining_secs(T0 + 50_000), 1490);
        assert!(!clock.run(T0 + 70_000));
        assert_eq!(clock.accumulated_pause_ms(), 60_000);
        assert_eq!(clock.remaining_secs(T0 + 80_000), 1480);
    }

    #[test]
    fn suspension_is_subtracted() {
        let mut clock = ElapsedClock::new(400);
        clock.run(T0);
        assert_eq!(clock.remaining_secs(T0 + 300_000), 100);
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let mut clock = ElapsedClock::new(5);
        clock.run(T0);
        assert_eq!(clock.remaining_secs(T0 + 3_600_000), 0);
    }

    #[test]
    fn sub_second_elapsed_is_floored() {
        let mut clock = ElapsedClock::new(10);
        clock.run(T0);
        assert_eq!(clock.remaining_secs(T0 + 999), 10);
        assert_eq!(clock.remaining_secs(T0 + 1_000), 9);
    }

    #[test]
    fn clock_stepping_backwards_never_adds_time() {
        let mut clock = ElapsedClock::new(60);
        clock.run(T0);
        assert_eq!(clock.remaining_secs(T0 - 30_000), 60);
    }

    #[test]
    fn reset_clears_timestamps() {
        let mut clock = ElapsedClock::new(60);
        clock.run(T0);
        clock.pause(T0 + 1_000);
        clock.reset(300);
        assert_eq!(clock, ElapsedClock::new(300));
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let a = ManualClock::new(T0);
        let b = a.clone();
        a.advance_secs(5);
        assert_eq!(b.now_ms(), T0 + 5_000);
    }

    #[test]
    fn manual_clock_at_local_midnight_maps_to_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let clock = ManualClock::at_local(date, 12 * 3_600_000);
        assert_eq!(clock.today(), date);
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_time_left(1500), "25:00");
        assert_eq!(format_time_left(61), "01:01");
        assert_eq!(format_time_left(0), "00:00");
    }
}
