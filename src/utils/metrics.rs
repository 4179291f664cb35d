use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::info;

/// Counters for one run, logged when the run ends
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetrics {
    pub run_number: u64,

    /// Start time of the run
    pub started_at: DateTime<Utc>,

    /// Listing pages whose links were collected
    pub pages_visited: u32,

    /// Resolved detail links across all listing pages
    pub links_found: usize,

    /// Links skipped because they were already handled in this run
    pub duplicates_skipped: usize,

    /// Documents written with status OK
    pub saved: usize,

    /// Documents written with status FAILED
    pub failed: usize,

    /// Writes the store rejected
    pub store_errors: usize,

    /// Set when the run ended on an empty listing page
    pub ended_early: bool,

    pub elapsed_ms: u64,
}

impl RunMetrics {
    pub fn new(run_number: u64) -> Self {
        Self {
            run_number,
            started_at: Utc::now(),
            pages_visited: 0,
            links_found: 0,
            duplicates_skipped: 0,
            saved: 0,
            failed: 0,
            store_errors: 0,
            ended_early: false,
            elapsed_ms: 0,
        }
    }

    /// Start timing the run
    pub fn start_timer(&self) -> RunTimer {
        RunTimer {
            start: Instant::now(),
        }
    }

    /// Items that got as far as a write attempt
    pub fn processed(&self) -> usize {
        self.saved + self.failed
    }

    pub fn finish(&mut self, timer: &RunTimer) {
        self.elapsed_ms = timer.end().as_millis() as u64;
    }

    pub fn log_summary(&self) {
        info!(
            run = self.run_number,
            started_at = %self.started_at,
            pages = self.pages_visited,
            links = self.links_found,
            duplicates = self.duplicates_skipped,
            saved = self.saved,
            failed = self.failed,
            processed = self.processed(),
            store_errors = self.store_errors,
            ended_early = self.ended_early,
            elapsed_secs = self.elapsed_ms / 1000,
            "Run finished"
        );
    }
}

/// Timer for measuring run durations
pub struct RunTimer {
    /// Start time of the run
    start: Instant,
}

impl RunTimer {
    /// Time since the timer started
    pub fn end(&self) -> Duration {
        self.start.elapsed()
    }
}
