//! CSV report generator.

use crate::config::Config;
use crate::error::Result;
use crate::reporter::ReportGenerator;
use crate::types::{ReportRow, ScanResult};

/// CSV report generator.
pub struct CsvReporter {
    latest_only: bool,
    flag_major_upgrades: bool,
}

impl CsvReporter {
    /// Create a new CSV reporter.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            latest_only: config.output.latest_only,
            flag_major_upgrades: config.output.flag_major_upgrades,
        }
    }

    fn header(&self) -> Vec<&'static str> {
        let mut header = vec!["repo_link", "current_version", "file_name"];
        header.push(if self.latest_only { "latest_version" } else { "updates_available" });
        if self.flag_major_upgrades {
            header.push("major_upgrade");
        }
        header
    }

    fn record(&self, row: &ReportRow) -> Vec<String> {
        let mut record = vec![
            row.repository_url.clone(),
            row.pinned_ref.clone(),
            row.origin_file.clone(),
            row.updates_available.clone(),
        ];
        if self.flag_major_upgrades {
            record.push(row.is_major_upgrade.unwrap_or_default().to_string());
        }
        record
    }
}

impl ReportGenerator for CsvReporter {
    fn generate(&self, result: &ScanResult) -> Result<String> {
        let mut output = String::new();
        push_record(&mut output, self.header());
        for row in &result.rows {
            push_record(&mut output, self.record(row));
        }
        Ok(output)
    }
}

fn push_record<I, S>(output: &mut String, fields: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let line = fields
        .into_iter()
        .map(|f| quote(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    output.push_str(&line);
    output.push('\n');
}

/// RFC 4180 quoting: fields with a comma, quote or line break are wrapped
/// in quotes and inner quotes doubled.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(updates: &str, major: Option<bool>) -> ReportRow {
        ReportRow {
            repository_url: "git@github.com:org/terraform-vpc.git".to_string(),
            pinned_ref: "v1.0.1".to_string(),
            updates_available: updates.to_string(),
            origin_file: "infra/main.tf".to_string(),
            is_major_upgrade: major,
        }
    }

    fn result(rows: Vec<ReportRow>) -> ScanResult {
        ScanResult {
            rows,
            ..ScanResult::default()
        }
    }

    #[test]
    fn test_all_updates() {
        let csv = CsvReporter::new(&Config::default())
            .generate(&result(vec![row("v1.0.2|v1.0.3-beta", None)]))
            .unwrap();
        assert_eq!(
            csv,
            "repo_link,current_version,file_name,updates_available\n\
             git@github.com:org/terraform-vpc.git,v1.0.1,infra/main.tf,v1.0.2|v1.0.3-beta\n"
        );
    }

    #[test]
    fn test_latest_only_with_major_column() {
        let mut config = Config::default();
        config.output.latest_only = true;
        config.output.flag_major_upgrades = true;

        let csv = CsvReporter::new(&config)
            .generate(&result(vec![row("v2.0.0", Some(true))]))
            .unwrap();
        assert_eq!(
            csv,
            "repo_link,current_version,file_name,latest_version,major_upgrade\n\
             git@github.com:org/terraform-vpc.git,v1.0.1,infra/main.tf,v2.0.0,true\n"
        );
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote("a,b"), "\"a,b\"");
        assert_eq!(quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
