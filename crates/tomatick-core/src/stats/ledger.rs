//! Per-day, per-phase minutes ledger and the lifetime cycle counter.
//!
//! All mutations are additive and infallible; the only way minutes go down
//! is [`Ledger::reset`].

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::timer::Phase;

/// Minutes logged on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub work: u64,
    pub short_break: u64,
    pub long_break: u64,
}

impl DailyStats {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            work: 0,
            short_break: 0,
            long_break: 0,
        }
    }

    pub fn minutes(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Work => self.work,
            Phase::ShortBreak => self.short_break,
            Phase::LongBreak => self.long_break,
        }
    }

    fn add(&mut self, phase: Phase, minutes: u64) {
        let slot = match phase {
            Phase::Work => &mut self.work,
            Phase::ShortBreak => &mut self.short_break,
            Phase::LongBreak => &mut self.long_break,
        };
        *slot = slot.saturating_add(minutes);
    }

    pub fn total(&self) -> u64 {
        self.work
            .saturating_add(self.short_break)
            .saturating_add(self.long_break)
    }
}

/// Minutes summed per phase over some set of days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTotals {
    pub work: u64,
    pub short_break: u64,
    pub long_break: u64,
}

impl PhaseTotals {
    pub fn add_day(&mut self, day: &DailyStats) {
        self.work = self.work.saturating_add(day.work);
        self.short_break = self.short_break.saturating_add(day.short_break);
        self.long_break = self.long_break.saturating_add(day.long_break);
    }

    pub fn total(&self) -> u64 {
        self.work
            .saturating_add(self.short_break)
            .saturating_add(self.long_break)
    }
}

impl<'a> FromIterator<&'a DailyStats> for PhaseTotals {
    fn from_iter<I: IntoIterator<Item = &'a DailyStats>>(iter: I) -> Self {
        let mut totals = PhaseTotals::default();
        for day in iter {
            totals.add_day(day);
        }
        totals
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    #[serde(default)]
    total_cycles: u64,
    #[serde(default)]
    daily_stats: BTreeMap<NaiveDate, DailyStats>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DailyStats> {
        self.daily_stats.get(&date)
    }

    /// Days with a record, oldest first.
    pub fn days(&self) -> impl Iterator<Item = &DailyStats> {
        self.daily_stats.values()
    }

    pub fn is_empty(&self) -> bool {
        self.daily_stats.is_empty() && self.total_cycles == 0
    }

    /// Add `minutes` to `(date, phase)`, creating the day if absent.
    pub fn log_time(&mut self, phase: Phase, minutes: u64, date: NaiveDate) {
        self.daily_stats
            .entry(date)
            .or_insert_with(|| DailyStats::empty(date))
            .add(phase, minutes);
    }

    pub fn increment_cycles(&mut self) {
        self.total_cycles = self.total_cycles.saturating_add(1);
    }

    /// Clear every day and the cycle counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
