//! Configuration module
//!
//! Handles loading and managing configuration.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::ConfigFile;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::executor::RunOptions;
use crate::output::OutputFormat;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Worker processes; zero or less means one per available CPU
    pub processes: i32,

    /// Seconds to wait for a free worker slot
    pub process_timeout_secs: u64,

    /// Report format (table, summary, json, json-pretty, csv)
    pub format: String,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Manifest used when none is given on the command line
    pub manifest: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            processes: 0,
            process_timeout_secs: 1800,
            format: "table".to_string(),
            log_level: "info".to_string(),
            manifest: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        let config: Self = if is_yaml_file(path.as_ref()) {
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?
        } else {
            serde_json::from_str(&content).context("Failed to parse JSON config")?
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = if is_yaml_file(path.as_ref()) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.process_timeout_secs)
    }

    pub fn output_format(&self) -> Result<OutputFormat> {
        OutputFormat::from_str(&self.format)
            .with_context(|| format!("Unknown output format: {}", self.format))
    }

    /// Runner options for this configuration
    ///
    /// Fails on a zero process timeout, whichever layer set it.
    pub fn run_options(&self, colorize: bool) -> Result<RunOptions> {
        if self.process_timeout_secs == 0 {
            anyhow::bail!("Process timeout must be at least 1 second");
        }

        Ok(RunOptions {
            processes: self.processes,
            process_timeout: self.process_timeout(),
            format: self.output_format()?,
            colorize,
        })
    }
}

/// Check if file is YAML based on extension
pub(crate) fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
