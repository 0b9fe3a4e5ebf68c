//! JSON report generators.

use crate::config::Config;
use crate::error::Result;
use crate::reporter::ReportGenerator;
use crate::types::{FailureRow, ReportRow, ScanResult};
use serde::Serialize;

/// JSON module report generator.
pub struct JsonReporter {
    flag_major_upgrades: bool,
}

impl JsonReporter {
    /// Create a new JSON reporter.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            flag_major_upgrades: config.output.flag_major_upgrades,
        }
    }
}

/// `{"report": [...]}`
#[derive(Debug, Serialize)]
struct JsonReport<'a, T> {
    report: Vec<&'a T>,
}

impl ReportGenerator for JsonReporter {
    fn generate(&self, result: &ScanResult) -> Result<String> {
        let rows: Vec<ReportRow> = result
            .rows
            .iter()
            .filter(|row| !row.pinned_ref.is_empty())
            .map(|row| ReportRow {
                is_major_upgrade: row.is_major_upgrade.filter(|_| self.flag_major_upgrades),
                ..row.clone()
            })
            .collect();

        serialize(&JsonReport {
            report: rows.iter().collect(),
        })
    }
}

/// Failure report generator; always JSON.
pub struct FailureReporter;

impl ReportGenerator for FailureReporter {
    fn generate(&self, result: &ScanResult) -> Result<String> {
        serialize(&JsonReport::<FailureRow> {
            report: result.failures.iter().collect(),
        })
    }
}

fn serialize<T: Serialize>(report: &T) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(|e| crate::err!(ReportGeneration {
        message: format!("Failed to serialize JSON report: {e}"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn row(pinned: &str) -> ReportRow {
        ReportRow {
            repository_url: "https://github.com/org/repo".to_string(),
            pinned_ref: pinned.to_string(),
            updates_available: "v1.1.0".to_string(),
            origin_file: "main.tf".to_string(),
            is_major_upgrade: Some(false),
        }
    }

    #[test]
    fn test_rows_without_version_are_dropped() {
        let result = ScanResult {
            rows: vec![row("v1.0.0"), row("")],
            ..ScanResult::default()
        };
        let json = JsonReporter::new(&Config::default()).generate(&result).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(
            value,
            json!({"report": [{
                "repo_link": "https://github.com/org/repo",
                "current_version": "v1.0.0",
                "updates_available": "v1.1.0",
                "file_name": "main.tf"
            }]})
        );
    }

    #[test]
    fn test_major_upgrade_key_when_flagged() {
        let mut config = Config::default();
        config.output.flag_major_upgrades = true;
        let result = ScanResult {
            rows: vec![row("v1.0.0")],
            ..ScanResult::default()
        };
        let json = JsonReporter::new(&config).generate(&result).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["report"][0]["major_upgrade"], json!(false));
    }

    #[test]
    fn test_failure_report() {
        let result = ScanResult {
            failures: vec![FailureRow {
                repository_url: "git@github.com:org/private.git".to_string(),
                pinned_ref: "v1.0.0".to_string(),
                updates_available: String::new(),
                origin_file: "main.tf".to_string(),
                error: "authentication failed".to_string(),
            }],
            ..ScanResult::default()
        };
        let json = FailureReporter.generate(&result).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["report"][0]["error"], "authentication failed");
        assert_eq!(value["report"][0]["repo_link"], "git@github.com:org/private.git");
    }
}
