//! Report generation module.
//!
//! This module provides report generation in multiple formats:
//! - CSV: the module report, one row per resolved module
//! - JSON: the module report as `{"report": [...]}`, and the failure report
//! - Text: the summary printed to the terminal
//!
//! # Example
//!
//! ```rust,no_run
//! use samwise::reporter::{OutputFormat, Reporter};
//! use samwise::types::ScanResult;
//! use samwise::Config;
//!
//! let config = Config::default();
//! let reporter = Reporter::new(&config);
//! let csv = reporter.generate(&ScanResult::default(), OutputFormat::Csv).unwrap();
//! println!("{csv}");
//! ```

mod csv;
mod json;
mod text;

use crate::config::Config;
use crate::error::{Result, SamwiseError};
use crate::types::ScanResult;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use csv::CsvReporter;
pub use json::{FailureReporter, JsonReporter};
pub use text::TextReporter;

/// Module report name used when none (or an unusable one) is configured.
pub const DEFAULT_REPORT_NAME: &str = "module_report";

/// Name of the failure report, always JSON.
pub const FAILURE_REPORT_NAME: &str = "failure_report";

/// Module report file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = SamwiseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(crate::err!(ConfigValue {
                key: "output.format".to_string(),
                message: format!("unsupported output format '{other}', expected csv or json"),
            })),
        }
    }
}

/// Report generator that supports multiple output formats.
pub struct Reporter {
    config: Config,
}

impl Reporter {
    /// Create a new reporter with the given configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Generate the module report in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if report generation fails.
    pub fn generate(&self, result: &ScanResult, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Csv => CsvReporter::new(&self.config).generate(result),
            OutputFormat::Json => JsonReporter::new(&self.config).generate(result),
        }
    }

    /// Terminal summary.
    ///
    /// # Errors
    ///
    /// Returns an error if report generation fails.
    pub fn summary(&self, result: &ScanResult) -> Result<String> {
        TextReporter::new(&self.config).generate(result)
    }

    /// Write the module report next to the scanned `root` and return its path.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValue` for an unsupported format, or an I/O error if the
    /// file cannot be written.
    pub fn write_report(&self, result: &ScanResult, root: &Path) -> Result<PathBuf> {
        let format = self.config.output_format()?;
        let path = report_path(root, &self.config.output.filename, format);
        let content = self.generate(result, format)?;
        write(&path, &content)?;
        tracing::info!(path = %path.display(), rows = result.rows.len(), "Report written");
        Ok(path)
    }

    /// Write `failure_report.json` in `root` if any module failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_failure_report(&self, result: &ScanResult, root: &Path) -> Result<Option<PathBuf>> {
        if result.failures.is_empty() {
            return Ok(None);
        }
        let path = report_path(root, FAILURE_REPORT_NAME, OutputFormat::Json);
        let content = FailureReporter.generate(result)?;
        write(&path, &content)?;
        tracing::info!(path = %path.display(), failures = result.failures.len(), "Failure report written");
        Ok(Some(path))
    }
}

/// Trait for report generators.
pub trait ReportGenerator {
    /// Generate a report from scan results.
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails.
    fn generate(&self, result: &ScanResult) -> Result<String>;
}

/// Where a report named `filename` goes.
///
/// Any extension on `filename` is replaced by the format's; a name that is
/// empty once the extension is gone falls back to [`DEFAULT_REPORT_NAME`].
/// Relative names resolve against `root`.
#[must_use]
pub fn report_path(root: &Path, filename: &str, format: OutputFormat) -> PathBuf {
    let (dir, name) = match filename.rfind(['/', '\\']) {
        Some(i) => filename.split_at(i + 1),
        None => ("", filename),
    };
    let stem = name.rfind('.').map_or(name, |i| &name[..i]);
    let stem = if stem.is_empty() { DEFAULT_REPORT_NAME } else { stem };

    let path = Path::new(dir).join(format!("{stem}.{}", format.extension()));
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

fn write(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| SamwiseError::io(path, e, file!(), line!()))
}
