//! Test case and fingerprint models
//!
//! Defines command cases and the textual identity used to find them again
//! after their results come back from a worker process.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Deterministic textual identity of a case, formatted as `Case(<identity>)`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_identity(identity: &str) -> Self {
        Self(format!("Case({identity})"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Joins the suite and case names in a case identity; names must not contain it
pub const IDENTITY_SEPARATOR: &str = "::";

/// Anything that can render a stable identity for fingerprinting
pub trait Identify {
    /// Identity representation; must be unique within a run
    fn identity(&self) -> String;

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_identity(&self.identity())
    }
}

/// A single command case
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Case name, unique inside its suite
    pub name: String,

    /// Owning suite name (filled in when the case joins a suite)
    #[serde(default)]
    pub suite: String,

    /// Program followed by its arguments
    pub command: Vec<String>,

    /// Exit code that counts as a pass
    #[serde(default)]
    pub expect_code: i32,

    /// Skip reason; the command is not run when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<String>,

    /// Per-case timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Extra environment variables
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

impl TestCase {
    pub fn new<I, S>(name: impl Into<String>, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            suite: String::new(),
            command: command.into_iter().map(Into::into).collect(),
            expect_code: 0,
            skip: None,
            timeout_secs: None,
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    /// Shell one-liner case (`sh -c <script>`)
    pub fn shell(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self::new(name, ["sh".to_string(), "-c".to_string(), script.into()])
    }

    pub fn expect_code(mut self, code: i32) -> Self {
        self.expect_code = code;
        self
    }

    pub fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.skip = Some(reason.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Command line as a single display string
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

impl Identify for TestCase {
    fn identity(&self) -> String {
        format!("{}{}{}", self.suite, IDENTITY_SEPARATOR, self.name)
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.suite, IDENTITY_SEPARATOR, self.name)
    }
}

/// Case execution status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Pass,
    Fail,
    Skip,
    Error,
}

impl CaseStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            CaseStatus::Pass => "✓",
            CaseStatus::Fail => "✗",
            CaseStatus::Skip => "○",
            CaseStatus::Error => "!",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CaseStatus::Pass)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Pass => write!(f, "PASS"),
            CaseStatus::Fail => write!(f, "FAIL"),
            CaseStatus::Skip => write!(f, "SKIP"),
            CaseStatus::Error => write!(f, "ERROR"),
        }
    }
}
