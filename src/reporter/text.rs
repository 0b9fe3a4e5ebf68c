//! Plain text summary for CLI output.

use crate::config::Config;
use crate::error::Result;
use crate::git::CommitOutcome;
use crate::reporter::ReportGenerator;
use crate::types::{ScanResult, TAGS_UNAVAILABLE};
use colored::Colorize;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use std::path::Path;

/// Text report generator for CLI output.
pub struct TextReporter {
    /// Whether to use colors
    use_colors: bool,
    latest_only: bool,
}

impl TextReporter {
    /// Create a new text reporter.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            use_colors: config.output.colored,
            latest_only: config.output.latest_only,
        }
    }
}

impl ReportGenerator for TextReporter {
    fn generate(&self, result: &ScanResult) -> Result<String> {
        let mut output = String::new();

        output.push_str(&self.format_header());
        output.push_str(&self.format_summary(result));

        if result.outdated() > 0 {
            output.push_str(&self.format_updates(result));
        }
        if !result.failures.is_empty() {
            output.push_str(&self.format_failures(result));
        }
        if !result.mutations.is_empty() {
            output.push_str(&self.format_mutations(result));
        }
        if let Some(commit) = &result.commit {
            output.push_str(&self.format_commit(commit));
        }

        Ok(output)
    }
}

impl TextReporter {
    fn title(&self, text: &str) -> String {
        let title = if self.use_colors {
            text.bright_cyan().bold().to_string()
        } else {
            text.to_string()
        };
        format!("\n{title}\n{}\n", "-".repeat(80))
    }

    fn format_header(&self) -> String {
        let title = "samwise";
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

        if self.use_colors {
            format!(
                "\n{} {} {}\n{}\n",
                title.bright_white().bold(),
                version.dimmed(),
                format!("({timestamp})").dimmed(),
                "=".repeat(80).bright_blue(),
            )
        } else {
            format!("\n{title} {version} ({timestamp})\n{}\n", "=".repeat(80))
        }
    }

    fn format_summary(&self, result: &ScanResult) -> String {
        let mut output = self.title("Summary");

        let outdated = result.outdated();
        let current = result.rows.len() - outdated;
        let failed = result.failures.len();

        if self.use_colors {
            output.push_str(&format!(
                "  {} outdated | {} up to date | {} failed\n",
                outdated.to_string().yellow().bold(),
                current.to_string().green(),
                failed.to_string().red().bold(),
            ));
        } else {
            output.push_str(&format!(
                "  {outdated} outdated | {current} up to date | {failed} failed\n"
            ));
        }

        output.push_str(&format!(
            "  {} directories | {} modules | {} repositories contacted\n",
            result.directories_scanned.len(),
            result.references.len(),
            result.repositories_contacted,
        ));
        output
    }

    fn format_updates(&self, result: &ScanResult) -> String {
        let mut output = self.title("Updates");

        let mut table = Table::new();
        table
            .load_preset(comfy_table::presets::UTF8_BORDERS_ONLY)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                "Repository",
                "Current",
                if self.latest_only { "Latest" } else { "Available" },
                "File",
            ]);

        for row in result.rows.iter().filter(|r| !r.updates_available.is_empty()) {
            let mut updates = Cell::new(row.updates_available.replace('|', ", "));
            if self.use_colors {
                updates = match (row.updates_available.as_str(), row.is_major_upgrade) {
                    (TAGS_UNAVAILABLE, _) => updates.fg(Color::DarkGrey),
                    (_, Some(true)) => updates.fg(Color::Red),
                    _ => updates.fg(Color::Yellow),
                };
            }
            table.add_row(vec![
                Cell::new(truncate(&row.repository_url, 50)),
                Cell::new(&row.pinned_ref),
                updates,
                Cell::new(contextual_path(&row.origin_file, 3)),
            ]);
        }

        output.push_str(&table.to_string());
        output.push('\n');
        output
    }

    fn format_failures(&self, result: &ScanResult) -> String {
        let mut output = self.title("Failures");

        let mut table = Table::new();
        table
            .load_preset(comfy_table::presets::UTF8_BORDERS_ONLY)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Repository", "Current", "Error"]);

        for failure in &result.failures {
            let error = if self.use_colors {
                Cell::new(&failure.error).fg(Color::Red)
            } else {
                Cell::new(&failure.error)
            };
            table.add_row(vec![
                Cell::new(truncate(&failure.repository_url, 50)),
                Cell::new(&failure.pinned_ref),
                error,
            ]);
        }

        output.push_str(&table.to_string());
        output.push('\n');
        output
    }

    fn format_mutations(&self, result: &ScanResult) -> String {
        let mut output = self.title("Updated files");
        for file in result.mutated_files() {
            let count = result.mutations.iter().filter(|m| &m.file_path == file).count();
            output.push_str(&format!("  {} ({count})\n", file.display()));
        }
        output
    }

    fn format_commit(&self, commit: &CommitOutcome) -> String {
        let line = format!("  {commit}\n");
        let line = match (self.use_colors, commit) {
            (true, CommitOutcome::Committed { .. }) => line.green().to_string(),
            (true, CommitOutcome::Aborted { .. }) => line.red().to_string(),
            _ => line,
        };
        format!("{}{line}", self.title("Commit"))
    }
}

/// Shorten long strings to `max` characters.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Last `components` parts of a path.
fn contextual_path(path: &str, components: usize) -> String {
    let parts: Vec<_> = Path::new(path).components().collect();
    if parts.len() <= components {
        return path.to_string();
    }
    parts[parts.len() - components..]
        .iter()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureRow, ReportRow};

    fn config() -> Config {
        let mut config = Config::default();
        config.output.colored = false;
        config
    }

    #[test]
    fn test_summary_counts() {
        let result = ScanResult {
            rows: vec![
                ReportRow {
                    repository_url: "https://github.com/org/vpc".to_string(),
                    pinned_ref: "v1.0.0".to_string(),
                    updates_available: "v1.1.0|v1.2.0".to_string(),
                    origin_file: "envs/prod/network/main.tf".to_string(),
                    is_major_upgrade: None,
                },
                ReportRow {
                    repository_url: "https://github.com/org/dns".to_string(),
                    pinned_ref: "v2.0.0".to_string(),
                    updates_available: String::new(),
                    origin_file: "main.tf".to_string(),
                    is_major_upgrade: None,
                },
            ],
            failures: vec![FailureRow {
                repository_url: "git@github.com:org/private.git".to_string(),
                pinned_ref: "v0.1.0".to_string(),
                updates_available: String::new(),
                origin_file: "main.tf".to_string(),
                error: "authentication failed".to_string(),
            }],
            ..ScanResult::default()
        };

        let text = TextReporter::new(&config()).generate(&result).unwrap();
        assert!(text.contains("1 outdated | 1 up to date | 1 failed"));
        assert!(text.contains("v1.1.0, v1.2.0"));
        assert!(text.contains("prod/network/main.tf"));
        assert!(text.contains("authentication failed"));
    }

    #[test]
    fn test_commit_line() {
        let result = ScanResult {
            commit: Some(CommitOutcome::NothingToCommit {
                branch: "samwise/module-updates-2024-01-01".to_string(),
            }),
            ..ScanResult::default()
        };
        let text = TextReporter::new(&config()).generate(&result).unwrap();
        assert!(text.contains("nothing to commit on samwise/module-updates-2024-01-01"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-repository-name", 10), "a-very-...");
    }
}
