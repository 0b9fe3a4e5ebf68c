//! `terraform fmt` pass run before files are parsed in update mode.
//!
//! Formatting first means the rewritten files only differ by their refs. A
//! missing binary or a failing run is logged and the directory is used as is.

use crate::config::FormatterOptions;
use std::path::Path;
use tokio::process::Command;

/// Result of formatting one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    Formatted,
    Disabled,
    /// The command could not be started or exited with an error
    Skipped { reason: String },
}

/// Runs `<command> fmt` in a directory.
#[derive(Debug, Clone)]
pub struct Formatter {
    options: FormatterOptions,
}

impl Formatter {
    #[must_use]
    pub fn new(options: &FormatterOptions) -> Self {
        Self {
            options: options.clone(),
        }
    }

    pub async fn format(&self, dir: &Path) -> FormatOutcome {
        if !self.options.enabled {
            return FormatOutcome::Disabled;
        }

        let output = Command::new(&self.options.command)
            .arg("fmt")
            .current_dir(dir)
            .output()
            .await;

        let outcome = match output {
            Ok(output) if output.status.success() => FormatOutcome::Formatted,
            Ok(output) => FormatOutcome::Skipped {
                reason: format!(
                    "{} fmt exited with {}: {}",
                    self.options.command,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            },
            Err(e) => FormatOutcome::Skipped {
                reason: format!("could not run {}: {e}", self.options.command),
            },
        };

        match &outcome {
            FormatOutcome::Skipped { reason } => {
                tracing::warn!(dir = %dir.display(), reason = %reason, "Formatter skipped");
            }
            _ => tracing::debug!(dir = %dir.display(), command = %self.options.command, "Directory formatted"),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled() {
        let formatter = Formatter::new(&FormatterOptions {
            enabled: false,
            ..FormatterOptions::default()
        });
        assert_eq!(formatter.format(Path::new(".")).await, FormatOutcome::Disabled);
    }

    #[tokio::test]
    async fn test_missing_binary_is_skipped() {
        let formatter = Formatter::new(&FormatterOptions {
            enabled: true,
            command: "samwise-no-such-formatter".to_string(),
        });
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(formatter.format(dir.path()).await, FormatOutcome::Skipped { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_command_is_skipped() {
        // `false fmt` exits non-zero
        let formatter = Formatter::new(&FormatterOptions {
            enabled: true,
            command: "false".to_string(),
        });
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(formatter.format(dir.path()).await, FormatOutcome::Skipped { .. }));
    }
}
