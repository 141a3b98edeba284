//! Output formatters for run reports
//!
//! Provides Table, Summary, JSON and CSV output formats.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::models::{CaseRecord, CaseStatus, RunReport};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Report formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format a complete run report
    pub fn format_report(&self, report: &RunReport) -> Result<String> {
        let output = match self.format {
            OutputFormat::Table => self.format_report_table(report),
            OutputFormat::Json => serde_json::to_string(report)?,
            OutputFormat::JsonPretty => serde_json::to_string_pretty(report)?,
            OutputFormat::Csv => self.format_report_csv(report)?,
            OutputFormat::Summary => self.format_report_brief(report),
        };
        Ok(output)
    }

    /// Write the formatted report followed by a newline
    pub fn write_report<W: Write + ?Sized>(&self, report: &RunReport, out: &mut W) -> Result<()> {
        writeln!(out, "{}", self.format_report(report)?)?;
        out.flush()?;
        Ok(())
    }

    fn status_label(&self, status: CaseStatus) -> String {
        let label = format!("{} {}", status.symbol(), status);
        if !self.colorize {
            return label;
        }
        match status {
            CaseStatus::Pass => format!("\x1b[32m{label}\x1b[0m"),
            CaseStatus::Skip => format!("\x1b[33m{label}\x1b[0m"),
            CaseStatus::Fail | CaseStatus::Error => format!("\x1b[31m{label}\x1b[0m"),
        }
    }

    fn format_record(&self, status: CaseStatus, record: &CaseRecord) -> String {
        let mut output = format!("{} {}", self.status_label(status), record.case);
        for (i, line) in record.message.lines().enumerate() {
            if i == 0 {
                output.push_str(&format!(" - {line}"));
            } else {
                output.push_str(&format!("\n      {line}"));
            }
        }
        output
    }

    fn format_report_table(&self, report: &RunReport) -> String {
        let outcome = &report.outcome;
        let mut output = String::new();

        if outcome.records().next().is_some() {
            output.push_str("\n══════════════════════════════════════════════════════════════\n");
            for (status, record) in outcome.records() {
                output.push_str(&format!("  {}\n", self.format_record(status, record)));
            }
        }

        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!(
            "║  Ran {:5} cases in {:4} suites ({:3} processes) {:>12} ║\n",
            outcome.tests_run,
            report.suites,
            report.processes,
            format!("{}ms", report.duration_ms)
        ));
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        let fail_str = if self.colorize && outcome.failures.len() + outcome.errors.len() > 0 {
            format!(
                "\x1b[31m{:4}\x1b[0m | Error: \x1b[31m{:4}\x1b[0m",
                outcome.failures.len(),
                outcome.errors.len()
            )
        } else {
            format!(
                "{:4} | Error: {:4}",
                outcome.failures.len(),
                outcome.errors.len()
            )
        };

        output.push_str(&format!(
            "║  Pass: {:4} | Fail: {} | Skip: {:4}             ║\n",
            outcome.passed(),
            fail_str,
            outcome.skipped.len()
        ));
        output.push_str(&format!(
            "║  Pass Rate: {:5.1}% | {:44}║\n",
            report.pass_rate(),
            if report.interrupted {
                "INTERRUPTED"
            } else if report.is_success() {
                "OK"
            } else {
                "FAILED"
            }
        ));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        output
    }

    fn format_report_csv(&self, report: &RunReport) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["suite", "case", "status", "message"])?;

        let pass = CaseStatus::Pass.to_string();
        for case in &report.outcome.successes {
            writer.write_record([case.suite.as_str(), case.name.as_str(), pass.as_str(), ""])?;
        }
        for (status, record) in report.outcome.records() {
            writer.write_record([
                record.case.suite.as_str(),
                record.case.name.as_str(),
                status.to_string().as_str(),
                record.message.as_str(),
            ])?;
        }

        let bytes = writer.into_inner().context("Failed to flush CSV report")?;
        let mut output = String::from_utf8(bytes).context("CSV report is not UTF-8")?;
        // write_report adds the final newline
        if output.ends_with('\n') {
            output.pop();
        }
        Ok(output)
    }

    fn format_report_brief(&self, report: &RunReport) -> String {
        let outcome = &report.outcome;
        format!(
            "{}/{} passed ({:.1}%), {} failed, {} errors, {} skipped in {}ms{}",
            outcome.passed(),
            outcome.tests_run,
            report.pass_rate(),
            outcome.failures.len(),
            outcome.errors.len(),
            outcome.skipped.len(),
            report.duration_ms,
            if report.interrupted { " (interrupted)" } else { "" }
        )
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

/// Write a report to a file, without colors
pub fn write_report_to_file(
    path: impl AsRef<Path>,
    report: &RunReport,
    format: OutputFormat,
) -> Result<()> {
    let formatter = ResultFormatter::new(format).no_color();
    let mut file = std::fs::File::create(path.as_ref())?;
    formatter.write_report(report, &mut file)?;
    Ok(())
}
