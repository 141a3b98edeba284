//! Worker-side suite execution
//!
//! Runs inside a worker process: executes one suite against a local outcome,
//! turns every recorded case into its fingerprint and publishes the resulting
//! fragment on stdout.

use anyhow::{Context, Result};
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::models::{CaseStatus, Fingerprint, Identify, OutcomeFragment, Suite, TestCase};
use crate::pool::channel;

/// Lines of stderr kept in a failure message
const STDERR_TAIL_LINES: usize = 20;

/// Outcome recorded inside the worker process, before fingerprinting
#[derive(Debug, Default)]
struct LocalOutcome<'a> {
    passed: Vec<&'a TestCase>,
    failures: Vec<(&'a TestCase, String)>,
    errors: Vec<(&'a TestCase, String)>,
    skipped: Vec<(&'a TestCase, String)>,
    tests_run: usize,
}

impl<'a> LocalOutcome<'a> {
    fn add(&mut self, status: CaseStatus, case: &'a TestCase, message: String) {
        match status {
            CaseStatus::Pass => self.passed.push(case),
            CaseStatus::Fail => self.failures.push((case, message)),
            CaseStatus::Error => self.errors.push((case, message)),
            CaseStatus::Skip => self.skipped.push((case, message)),
        }
    }

    /// Replace each case by its fingerprint; messages pass through
    fn into_fragment(self) -> OutcomeFragment {
        OutcomeFragment {
            passed: self.passed.iter().map(|case| case.fingerprint()).collect(),
            failures: detach(self.failures),
            errors: detach(self.errors),
            skipped: detach(self.skipped),
            tests_run: self.tests_run,
        }
    }
}

fn detach(records: Vec<(&TestCase, String)>) -> Vec<(Fingerprint, String)> {
    records
        .into_iter()
        .map(|(case, message)| (case.fingerprint(), message))
        .collect()
}

/// Run every case of `suite` in order and build its fragment
pub async fn execute(suite: &Suite) -> OutcomeFragment {
    info!("Running suite '{}' ({} cases)", suite.name, suite.len());

    let mut local = LocalOutcome::default();
    for case in suite.iter() {
        local.tests_run += 1;
        let (status, message) = run_case(case).await;
        local.add(status, case, message);
    }

    local.into_fragment()
}

/// Run one case and classify the result
pub async fn run_case(case: &TestCase) -> (CaseStatus, String) {
    if let Some(reason) = &case.skip {
        debug!("{} skipped: {}", case, reason);
        return (CaseStatus::Skip, reason.clone());
    }

    let Some((program, args)) = case.command.split_first() else {
        return (CaseStatus::Error, "empty command".to_string());
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .envs(&case.env)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    if let Some(cwd) = &case.cwd {
        command.current_dir(cwd);
    }

    let start = Instant::now();
    let output = match case.timeout_secs {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), command.output()).await
        {
            Ok(output) => output,
            Err(_) => {
                return (
                    CaseStatus::Error,
                    format!("`{}` timed out after {}s", case.command_line(), secs),
                )
            }
        },
        None => command.output().await,
    };

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            return (
                CaseStatus::Error,
                format!("failed to start `{program}`: {e}"),
            )
        }
    };

    debug!(
        "{} finished in {}ms with {}",
        case,
        start.elapsed().as_millis(),
        output.status
    );

    if output.status.code() == Some(case.expect_code) {
        (CaseStatus::Pass, String::new())
    } else {
        (CaseStatus::Fail, failure_message(case, &output))
    }
}

fn failure_message(case: &TestCase, output: &Output) -> String {
    let mut message = format!(
        "expected exit code {}, got {}",
        case.expect_code, output.status
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    if !lines.is_empty() {
        let tail = &lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..];
        message.push('\n');
        message.push_str(&tail.join("\n"));
    }

    message
}

/// Worker process entry: suite on stdin, fragment on stdout
pub async fn serve_stdio() -> Result<()> {
    let mut payload = String::new();
    tokio::io::stdin()
        .read_to_string(&mut payload)
        .await
        .context("Failed to read suite from stdin")?;

    let suite: Suite = serde_json::from_str(&payload).context("Failed to parse suite")?;
    let fragment = execute(&suite).await;
    drop(suite);

    channel::publish(&fragment, std::io::stdout().lock()).context("Failed to publish results")?;
    Ok(())
}
