//! Run timing
//!
//! Wall-clock duration of a run together with the moment it started.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Measures a run from `start` to `stop`
#[derive(Debug)]
pub struct Timer {
    label: String,
    start: Instant,
    started_at: DateTime<Utc>,
}

impl Timer {
    /// Create and start a new timer
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            start: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Wall-clock time the timer was started
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    /// Stop timer and return elapsed time
    pub fn stop(self) -> Duration {
        let elapsed = self.elapsed();
        tracing::debug!("{}: {}ms", self.label, elapsed.as_millis());
        elapsed
    }
}
