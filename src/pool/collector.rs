//! Result collector
//!
//! Cases cannot travel back from a worker process, only their fingerprints.
//! The collector keeps a fingerprint table built from the original suites and
//! uses it to reattach every reported entry to the case object it came from.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tracing::{debug, info};

use super::channel::FragmentReceiver;
use super::error::PoolError;
use crate::models::{
    CaseStatus, Fingerprint, Identify, OutcomeFragment, SharedOutcome, Suite, TestCase,
};

/// Consumes fragments and merges them into the shared outcome
pub struct Collector {
    table: HashMap<Fingerprint, Arc<TestCase>>,
    receiver: FragmentReceiver,
    outcome: SharedOutcome,
    expected: usize,
    completed: usize,
}

impl Collector {
    /// Build the fingerprint table; fails on the first duplicate fingerprint
    pub fn new(
        suites: &[Suite],
        outcome: SharedOutcome,
        receiver: FragmentReceiver,
    ) -> Result<Self, PoolError> {
        let mut table = HashMap::new();

        for suite in suites {
            for case in suite.iter() {
                let fingerprint = case.fingerprint();
                if table.contains_key(&fingerprint) {
                    return Err(PoolError::DuplicateFingerprint(fingerprint));
                }
                table.insert(fingerprint, Arc::clone(case));
            }
        }

        debug!(
            "Fingerprint table holds {} cases from {} suites",
            table.len(),
            suites.len()
        );

        Ok(Self {
            table,
            receiver,
            outcome,
            expected: suites.len(),
            completed: 0,
        })
    }

    /// Cases not yet reported back
    pub fn remaining(&self) -> usize {
        self.table.len()
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Consume fragments until every scheduled suite has reported
    pub async fn handle(&mut self) -> Result<(), PoolError> {
        while self.completed < self.expected {
            let Some(fragment) = self.receiver.get().await else {
                return Err(PoolError::ChannelClosed {
                    completed: self.completed,
                    expected: self.expected,
                });
            };
            self.absorb(fragment)?;
        }

        info!(
            "Collected results from {}/{} suites",
            self.completed, self.expected
        );
        Ok(())
    }

    fn absorb(&mut self, fragment: OutcomeFragment) -> Result<(), PoolError> {
        let OutcomeFragment {
            passed,
            failures,
            errors,
            skipped,
            tests_run,
        } = fragment;

        let mut records =
            Vec::with_capacity(passed.len() + failures.len() + errors.len() + skipped.len());
        for fingerprint in passed {
            records.push((CaseStatus::Pass, self.take(fingerprint)?, String::new()));
        }
        for (status, entries) in [
            (CaseStatus::Fail, failures),
            (CaseStatus::Error, errors),
            (CaseStatus::Skip, skipped),
        ] {
            for (fingerprint, message) in entries {
                records.push((status, self.take(fingerprint)?, message));
            }
        }

        let mut outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        for (status, case, message) in records {
            outcome.record(status, case, message);
        }
        outcome.tests_run += tests_run;
        outcome.items_completed += 1;
        self.completed += 1;

        debug!(
            "Suite {}/{} reported {} cases",
            self.completed, self.expected, tests_run
        );
        Ok(())
    }

    fn take(&mut self, fingerprint: Fingerprint) -> Result<Arc<TestCase>, PoolError> {
        match self.table.remove(&fingerprint) {
            Some(case) => Ok(case),
            None => Err(PoolError::UnknownFingerprint(fingerprint)),
        }
    }
}
