use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::ledger::Ledger;
use crate::timer::{local_date, Clock, Phase};

/// A running interval of one phase that has not been logged yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSession {
    pub phase: Phase,
    pub started_ms: u64,
}

/// Attributes elapsed session time to the ledger.
pub struct SessionRecorder {
    ledger: Ledger,
    open: Option<OpenSession>,
    clock: Arc<dyn Clock>,
}

impl SessionRecorder {
    pub fn new(ledger: Ledger, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            open: None,
            clock,
        }
    }

    /// Reattach a session left open by a previous process.
    pub fn with_open_session(mut self, open: Option<OpenSession>) -> Self {
        self.open = open;
        self
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn open_session(&self) -> Option<OpenSession> {
        self.open
    }

    pub fn total_cycles(&self) -> u64 {
        self.ledger.total_cycles()
    }

    /// Open a session for `phase`. Returns `false` (and leaves the existing
    /// session untouched) if one is already open.
    pub fn start_session(&mut self, phase: Phase) -> bool {
        if let Some(open) = self.open {
            warn!(
                open_phase = %open.phase,
                requested = %phase,
                "session already open, ignoring start"
            );
            return false;
        }
        let started_ms = self.clock.now_ms();
        debug!(%phase, started_ms, "session opened");
        self.open = Some(OpenSession { phase, started_ms });
        true
    }

    /// Close the open session and log its whole elapsed minutes against the
    /// day it ends on. Returns the minutes logged, or `None` if no session
    /// was open.
    pub fn end_session(&mut self) -> Option<u64> {
        let now = self.clock.now_ms();
        self.end_session_at(now)
    }

    /// Like [`end_session`](Self::end_session) but closes the session at
    /// `end_ms` instead of now.
    pub fn end_session_at(&mut self, end_ms: u64) -> Option<u64> {
        let open = self.open.take()?;
        let minutes = end_ms.saturating_sub(open.started_ms) / 60_000;
        self.ledger.log_time(open.phase, minutes, local_date(end_ms));
        debug!(phase = %open.phase, minutes, "session closed");
        Some(minutes)
    }

    pub fn increment_cycles(&mut self) {
        self.ledger.increment_cycles();
        info!(total = self.ledger.total_cycles(), "cycle completed");
    }

    /// Add `minutes` to `(date, phase)`; `date` defaults to today.
    pub fn log_time(&mut self, phase: Phase, minutes: u64, date: Option<NaiveDate>) {
        let date = date.unwrap_or_else(|| self.clock.today());
        self.ledger.log_time(phase, minutes, date);
    }

    /// Clear the ledger, the cycle counter and any open session.
    pub fn reset_statistics(&mut self) {
        self.ledger.reset();
        self.open = None;
        info!("statistics reset");
    }
}
