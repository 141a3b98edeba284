//! Outcome models
//!
//! Fragments are what a worker process sends back; the aggregated outcome is
//! what the parent process builds out of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::case::{CaseStatus, Fingerprint, Identify, TestCase};
use super::suite::Suite;

/// Per-suite result crossing the process boundary
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeFragment {
    #[serde(default)]
    pub passed: Vec<Fingerprint>,
    pub failures: Vec<(Fingerprint, String)>,
    pub errors: Vec<(Fingerprint, String)>,
    pub skipped: Vec<(Fingerprint, String)>,
    pub tests_run: usize,
}

impl OutcomeFragment {
    /// Fragment standing in for a worker that never reported
    pub fn lost(suite: &Suite, reason: &str) -> Self {
        Self {
            errors: suite
                .iter()
                .map(|case| (case.fingerprint(), reason.to_string()))
                .collect(),
            tests_run: suite.len(),
            ..Default::default()
        }
    }

    /// Encode as a single JSON line
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim())
    }

    /// Number of fingerprint entries carried
    pub fn entries(&self) -> usize {
        self.passed.len() + self.failures.len() + self.errors.len() + self.skipped.len()
    }
}

/// A case reattached to its message
#[derive(Clone, Debug, Serialize)]
pub struct CaseRecord {
    pub case: Arc<TestCase>,
    pub message: String,
}

/// Results merged from every worker process
#[derive(Clone, Debug, Default, Serialize)]
pub struct AggregatedOutcome {
    pub tests_run: usize,
    pub items_completed: usize,
    pub successes: Vec<Arc<TestCase>>,
    pub failures: Vec<CaseRecord>,
    pub errors: Vec<CaseRecord>,
    pub skipped: Vec<CaseRecord>,
}

/// Outcome shared between the collector and the caller
pub type SharedOutcome = Arc<Mutex<AggregatedOutcome>>;

impl AggregatedOutcome {
    pub fn shared() -> SharedOutcome {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Append a reattached case to the list matching `status`
    pub fn record(&mut self, status: CaseStatus, case: Arc<TestCase>, message: String) {
        let record = CaseRecord { case, message };
        match status {
            CaseStatus::Pass => self.successes.push(record.case),
            CaseStatus::Fail => self.failures.push(record),
            CaseStatus::Error => self.errors.push(record),
            CaseStatus::Skip => self.skipped.push(record),
        }
    }

    /// Cases that ran without failure, error or skip
    pub fn passed(&self) -> usize {
        self.tests_run
            .saturating_sub(self.failures.len() + self.errors.len() + self.skipped.len())
    }

    pub fn was_successful(&self) -> bool {
        self.failures.is_empty() && self.errors.is_empty()
    }

    /// Every record paired with its status, failures first
    pub fn records(&self) -> impl Iterator<Item = (CaseStatus, &CaseRecord)> {
        self.failures
            .iter()
            .map(|r| (CaseStatus::Fail, r))
            .chain(self.errors.iter().map(|r| (CaseStatus::Error, r)))
            .chain(self.skipped.iter().map(|r| (CaseStatus::Skip, r)))
    }
}

/// Result of a complete run
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub processes: usize,
    pub suites: usize,
    pub interrupted: bool,
    pub outcome: AggregatedOutcome,
}

impl RunReport {
    pub fn pass_rate(&self) -> f64 {
        if self.outcome.tests_run == 0 {
            0.0
        } else {
            (self.outcome.passed() as f64 / self.outcome.tests_run as f64) * 100.0
        }
    }

    pub fn is_success(&self) -> bool {
        !self.interrupted && self.outcome.was_successful()
    }
}
