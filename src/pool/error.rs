//! Process pool errors

use std::time::Duration;
use thiserror::Error;

use crate::models::Fingerprint;

/// Fatal conditions raised by the scheduler and the collector
#[derive(Error, Debug)]
pub enum PoolError {
    /// Two cases rendered the same fingerprint; raised before anything runs
    #[error("Case fingerprint {0} already exists")]
    DuplicateFingerprint(Fingerprint),

    #[error("No free worker slot within {timeout:?}")]
    Timeout { timeout: Duration },

    /// A fragment referenced a case that is not (or no longer) in the table
    #[error("Fragment references unknown case {0}")]
    UnknownFingerprint(Fingerprint),

    #[error("Result channel closed after {completed} of {expected} suites")]
    ChannelClosed { completed: usize, expected: usize },

    #[error("Failed to spawn worker for suite '{suite}': {source}")]
    Spawn {
        suite: String,
        #[source]
        source: std::io::Error,
    },

    /// The pool was destroyed; no further workers are started
    #[error("Worker pool was destroyed")]
    Destroyed,
}

impl PoolError {
    /// Whether the error was raised before any worker process started
    pub fn is_configuration(&self) -> bool {
        matches!(self, PoolError::DuplicateFingerprint(_))
    }
}
