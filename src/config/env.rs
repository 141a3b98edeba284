//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

use super::AppConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "SUITEPOOL";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Worker processes from SUITEPOOL_PROCESSES
    pub processes: Option<i32>,
    /// Slot timeout from SUITEPOOL_PROCESS_TIMEOUT
    pub process_timeout: Option<u64>,
    /// Output format from SUITEPOOL_FORMAT
    pub format: Option<String>,
    /// Log level from SUITEPOOL_LOG_LEVEL
    pub log_level: Option<String>,
    /// Config file from SUITEPOOL_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            processes: get_env_parse("PROCESSES"),
            process_timeout: get_env_parse("PROCESS_TIMEOUT"),
            format: get_env("FORMAT"),
            log_level: get_env("LOG_LEVEL"),
            config_file: get_env("CONFIG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.processes.is_some()
            || self.process_timeout.is_some()
            || self.format.is_some()
            || self.log_level.is_some()
            || self.config_file.is_some()
    }

    /// Override file settings with whatever is set in the environment
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(processes) = self.processes {
            config.processes = processes;
        }
        if let Some(timeout) = self.process_timeout {
            config.process_timeout_secs = timeout;
        }
        if let Some(format) = &self.format {
            config.format = format.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_PROCESSES:       {:?}", ENV_PREFIX, self.processes);
        println!("  {}_PROCESS_TIMEOUT: {:?}", ENV_PREFIX, self.process_timeout);
        println!("  {}_FORMAT:          {:?}", ENV_PREFIX, self.format);
        println!("  {}_LOG_LEVEL:       {:?}", ENV_PREFIX, self.log_level);
        println!("  {}_CONFIG:          {:?}", ENV_PREFIX, self.config_file);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.trim().parse().ok())
}

/// Print all SUITEPOOL environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_PROCESSES        Worker processes (0 or less: one per CPU)");
    println!("  {ENV_PREFIX}_PROCESS_TIMEOUT  Seconds to wait for a free worker slot");
    println!("  {ENV_PREFIX}_FORMAT           Report format (table, summary, json, json-pretty, csv)");
    println!("  {ENV_PREFIX}_LOG_LEVEL        Log level (trace, debug, info, warn, error)");
    println!("  {ENV_PREFIX}_CONFIG           Path to configuration file");
    println!("  RUST_LOG                   Overrides the log filter entirely");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_PROCESSES=8");
    println!("  suitepool run -m suites.yaml");
}
