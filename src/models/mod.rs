//! Data models for suite execution
//!
//! This module contains all data structures used throughout the application.

mod case;
mod outcome;
mod suite;

pub use case::{CaseStatus, Fingerprint, Identify, TestCase};
pub use outcome::{AggregatedOutcome, CaseRecord, OutcomeFragment, RunReport, SharedOutcome};
pub use suite::{Manifest, Suite};
