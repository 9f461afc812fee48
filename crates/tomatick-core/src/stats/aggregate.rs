//! Read-only views over the ledger for reporting.
//!
//! Weeks start on Monday. Week offsets are relative to the week containing
//! `today`: 0 is the current week, -1 the previous one.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::ledger::{DailyStats, Ledger, PhaseTotals};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStats {
    /// Monday of the week.
    pub week_start: NaiveDate,
    /// Exactly seven days, Monday first.
    pub days: Vec<DailyStats>,
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

impl Ledger {
    /// Record for `date`, zero-filled when nothing was logged.
    pub fn daily_data(&self, date: NaiveDate) -> DailyStats {
        self.get(date)
            .copied()
            .unwrap_or_else(|| DailyStats::empty(date))
    }

    pub fn weekly_data(&self, today: NaiveDate, week_offset: i64) -> WeeklyStats {
        let monday = week_start(today) + Duration::weeks(week_offset);
        let days = (0..7)
            .map(|i| self.daily_data(monday + Duration::days(i)))
            .collect();
        WeeklyStats {
            week_start: monday,
            days,
        }
    }

    pub fn total_time_by_phase(&self) -> PhaseTotals {
        self.days().collect()
    }

    pub fn weekly_time_by_phase(&self, today: NaiveDate, week_offset: i64) -> PhaseTotals {
        self.weekly_data(today, week_offset).days.iter().collect()
    }
}
