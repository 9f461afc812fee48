use chrono::NaiveDate;
use clap::Subcommand;
use serde_json::json;
use tomatick_core::{Clock, Phase, SystemClock};

use super::{load_core, open_store, print_json};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Minutes per day for a week (Monday to Sunday)
    Week {
        /// Weeks relative to the current one (-1 = last week)
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        offset: i64,
        /// Print per-phase totals instead of daily records
        #[arg(long)]
        totals: bool,
    },
    /// Minutes per phase for one day
    Day {
        /// Date as YYYY-MM-DD (default: today)
        date: Option<NaiveDate>,
    },
    /// Lifetime minutes per phase
    Totals,
    /// Completed cycles
    Cycles,
    /// Add minutes by hand
    Log {
        /// work, short_break or long_break
        phase: String,
        minutes: u64,
        /// Date as YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete all statistics
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store()?;
    let mut core = load_core(store);

    match action {
        StatsAction::Week { offset, totals } => {
            if totals {
                print_json(&core.weekly_time_by_phase(offset))?;
            } else {
                print_json(&core.weekly_data(offset))?;
            }
        }
        StatsAction::Day { date } => {
            let date = date.unwrap_or_else(|| SystemClock.today());
            print_json(&core.daily_data(date))?;
        }
        StatsAction::Totals => print_json(&core.total_time_by_phase())?,
        StatsAction::Cycles => print_json(&json!({ "totalCycles": core.total_cycles() }))?,
        StatsAction::Log {
            phase,
            minutes,
            date,
        } => {
            let phase = Phase::from_label(&phase)
                .ok_or_else(|| format!("unknown phase: {phase}"))?;
            core.log_time(phase, minutes, date);
            print_json(&core.daily_data(date.unwrap_or_else(|| SystemClock.today())))?;
        }
        StatsAction::Reset { yes } => {
            if !yes {
                return Err("refusing to reset statistics without --yes".into());
            }
            core.reset_statistics();
            println!("statistics reset");
        }
    }
    Ok(())
}
