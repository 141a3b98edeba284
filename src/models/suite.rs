//! Suite and manifest models
//!
//! A suite is the unit of work scheduled into one worker process.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::case::{TestCase, IDENTITY_SEPARATOR};
use crate::config::is_yaml_file;

/// Ordered group of cases run together in one worker process
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Suite {
    pub name: String,

    #[serde(default)]
    pub cases: Vec<Arc<TestCase>>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
        }
    }

    /// Append a case, binding it to this suite
    pub fn case(mut self, mut case: TestCase) -> Self {
        case.suite = self.name.clone();
        self.cases.push(Arc::new(case));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TestCase>> {
        self.cases.iter()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Bind every case to this suite's name
    fn bind_cases(&mut self) {
        for case in &mut self.cases {
            if case.suite != self.name {
                Arc::make_mut(case).suite = self.name.clone();
            }
        }
    }
}

/// Suite manifest file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub suites: Vec<Suite>,
}

impl Manifest {
    pub fn new(suites: Vec<Suite>) -> Self {
        Self { suites }
    }

    /// Load a manifest from a YAML or JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;

        let mut manifest: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML manifest: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON manifest: {}", path.display()))?
        };

        for suite in &mut manifest.suites {
            suite.bind_cases();
        }

        manifest.validate()?;
        Ok(manifest)
    }

    /// Save manifest to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize manifest")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize manifest")?
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write manifest: {}", path.display()))?;
        Ok(())
    }

    /// Validate manifest contents
    pub fn validate(&self) -> Result<()> {
        for suite in &self.suites {
            if suite.name.trim().is_empty() {
                anyhow::bail!("Suite with empty name");
            }
            if suite.name.contains(IDENTITY_SEPARATOR) {
                anyhow::bail!(
                    "Suite name '{}' must not contain '{}'",
                    suite.name,
                    IDENTITY_SEPARATOR
                );
            }
            for case in &suite.cases {
                if case.name.trim().is_empty() {
                    anyhow::bail!("Case with empty name in suite '{}'", suite.name);
                }
                if case.name.contains(IDENTITY_SEPARATOR) {
                    anyhow::bail!(
                        "Case name '{}' in suite '{}' must not contain '{}'",
                        case.name,
                        suite.name,
                        IDENTITY_SEPARATOR
                    );
                }
                if case.command.is_empty() && case.skip.is_none() {
                    anyhow::bail!("Case '{}' in suite '{}' has no command", case.name, suite.name);
                }
            }
        }
        Ok(())
    }

    /// Total number of cases across all suites
    pub fn case_count(&self) -> usize {
        self.suites.iter().map(Suite::len).sum()
    }

    pub fn into_suites(self) -> Vec<Suite> {
        self.suites
    }
}
