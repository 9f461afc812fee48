//! Statistics module for Tomatick
//!
//! The ledger of minutes per day and phase, the recorder that feeds it from
//! finished sessions, and the weekly/total views used for reporting.

mod aggregate;
mod ledger;
mod recorder;

pub use aggregate::{week_start, WeeklyStats};
pub use ledger::{DailyStats, Ledger, PhaseTotals};
pub use recorder::{OpenSession, SessionRecorder};
