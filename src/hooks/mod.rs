//! Run hooks
//!
//! Hooks can replace the scheduled suites before a run, substitute the
//! report stream, and see the outcome once every worker has finished.

use std::io::Write;
use tracing::{debug, info};

use crate::models::{AggregatedOutcome, Suite};

/// Sink the run report is written to
pub type OutputStream = Box<dyn Write + Send>;

/// Extension points around a run
pub trait RunHooks: Send + Sync {
    fn name(&self) -> &str;

    /// Return replacement suites, or `None` to keep them
    fn prepare(&self, _suites: &[Suite]) -> Option<Vec<Suite>> {
        None
    }

    /// Take the current report stream and return `Ok` with its replacement,
    /// which may wrap it, or `Err` with the stream untouched
    fn set_output_stream(&self, stream: OutputStream) -> Result<OutputStream, OutputStream> {
        Err(stream)
    }

    /// Called once after all worker processes are done
    fn finalize(&self, _outcome: &mut AggregatedOutcome) {}
}

/// Ordered set of hooks applied as one
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Box<dyn RunHooks>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: impl RunHooks + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// First hook returning replacement suites wins
    pub fn prepare(&self, suites: Vec<Suite>) -> Vec<Suite> {
        for hook in &self.hooks {
            if let Some(replaced) = hook.prepare(&suites) {
                info!(
                    "Hook '{}' replaced {} suites with {}",
                    hook.name(),
                    suites.len(),
                    replaced.len()
                );
                return replaced;
            }
        }
        suites
    }

    /// First hook taking the stream wins; later hooks never see it
    pub fn set_output_stream(&self, mut stream: OutputStream) -> OutputStream {
        for hook in &self.hooks {
            match hook.set_output_stream(stream) {
                Ok(replaced) => {
                    debug!("Hook '{}' took over the report stream", hook.name());
                    return replaced;
                }
                Err(kept) => stream = kept,
            }
        }
        stream
    }

    /// Every hook sees the outcome, in order
    pub fn finalize(&self, outcome: &mut AggregatedOutcome) {
        for hook in &self.hooks {
            hook.finalize(outcome);
        }
    }
}

/// Keeps only selected suites, and cases whose name contains a pattern
#[derive(Clone, Debug, Default)]
pub struct SuiteFilter {
    suites: Vec<String>,
    pattern: Option<String>,
}

impl SuiteFilter {
    pub fn new(suites: Vec<String>, pattern: Option<String>) -> Self {
        Self { suites, pattern }
    }

    pub fn is_active(&self) -> bool {
        !self.suites.is_empty() || self.pattern.is_some()
    }

    fn keeps_suite(&self, suite: &Suite) -> bool {
        self.suites.is_empty() || self.suites.iter().any(|name| *name == suite.name)
    }
}

impl RunHooks for SuiteFilter {
    fn name(&self) -> &str {
        "suite-filter"
    }

    fn prepare(&self, suites: &[Suite]) -> Option<Vec<Suite>> {
        if !self.is_active() {
            return None;
        }

        let selected = suites
            .iter()
            .filter(|suite| self.keeps_suite(suite))
            .map(|suite| match &self.pattern {
                Some(pattern) => Suite {
                    name: suite.name.clone(),
                    cases: suite
                        .iter()
                        .filter(|case| case.name.contains(pattern.as_str()))
                        .cloned()
                        .collect(),
                },
                None => suite.clone(),
            })
            .filter(|suite| !suite.is_empty())
            .collect();

        Some(selected)
    }
}

/// Logs the final totals
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSummary;

impl RunHooks for LogSummary {
    fn name(&self) -> &str {
        "log-summary"
    }

    fn finalize(&self, outcome: &mut AggregatedOutcome) {
        info!(
            "Ran {} cases from {} suites: {} passed, {} failed, {} errors, {} skipped",
            outcome.tests_run,
            outcome.items_completed,
            outcome.passed(),
            outcome.failures.len(),
            outcome.errors.len(),
            outcome.skipped.len()
        );
    }
}
