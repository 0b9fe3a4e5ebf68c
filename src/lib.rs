//! # samwise
//!
//! Keeps Terraform module sources that point at git repositories up to date.
//!
//! samwise walks a directory tree, finds every `module` block whose `source`
//! is a git URL, lists the tags of that repository and works out which tags
//! are newer than the pinned `ref`.
//!
//! ## Features
//!
//! - **Source parsing**: `git::https://…`, `git@host:org/repo`,
//!   `github.com/…` and `bitbucket.org/…` sources, with sub-paths and `?ref=`
//! - **Tag resolution**: semver ordering that tolerates a leading `v`,
//!   partial versions and non-version tags; each repository is contacted
//!   once per run
//! - **Reports**: CSV or JSON module report, plus a JSON failure report
//! - **Updates**: rewrites `ref=` in place and commits on a dated branch
//!
//! ## Example
//!
//! ```rust,no_run
//! use samwise::{Config, Scanner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let scanner = Scanner::new(Config::default());
//!     let result = scanner.check("./terraform".as_ref()).await?;
//!
//!     println!("{} modules have newer versions", result.outdated());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod formatter;
pub mod git;
pub mod parser;
pub mod reporter;
pub mod resolver;
pub mod types;
pub mod updater;
pub mod version;
pub mod walker;

// Re-export commonly used types at crate root
pub use config::Config;
pub use error::{Result, SamwiseError};
pub use types::{ModuleSourceReference, ReportRow, ResolutionMode, ScanResult};

use crate::formatter::Formatter;
use crate::git::{GitClient, RepositoryInspector};
use crate::parser::HclParser;
use crate::resolver::VersionResolver;
use crate::types::FailureRow;
use crate::updater::UpdateApplicator;
use crate::walker::DirectoryWalker;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main scanner orchestrator.
///
/// The `Scanner` is the primary entry point for using samwise as a library.
/// Each call to [`check`](Self::check) or [`update`](Self::update) is one
/// run: tag lookups are memoized for the duration of that call only.
///
/// # Example
///
/// ```rust,no_run
/// use samwise::{Config, Scanner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let scanner = Scanner::new(Config::default());
///     let result = scanner.update("./infra".as_ref()).await?;
///
///     println!("{} files updated", result.mutated_files().len());
///     Ok(())
/// }
/// ```
pub struct Scanner {
    config: Config,
    git_client: GitClient,
}

/// State owned by a single run.
struct RunContext<I> {
    resolver: VersionResolver<I>,
    result: ScanResult,
    mode: ResolutionMode,
    flag_major_upgrades: bool,
}

impl<I: RepositoryInspector> RunContext<I> {
    fn new(inspector: I, mode: ResolutionMode, flag_major_upgrades: bool) -> Self {
        Self {
            resolver: VersionResolver::new(inspector),
            result: ScanResult::default(),
            mode,
            flag_major_upgrades,
        }
    }

    /// Resolve every non-inert reference into a report or failure row.
    async fn resolve_all(&mut self, dir: &Path, references: &[ModuleSourceReference]) {
        let progress = progress_bar(references.len() as u64);
        progress.set_message(dir.display().to_string());

        for reference in references {
            progress.inc(1);
            if reference.is_inert() {
                continue;
            }

            let origin_file = reference.origin_file.display().to_string();
            match self
                .resolver
                .resolve(&reference.repository_url, reference.pinned_ref_str())
                .await
            {
                Ok(resolution) => self.result.rows.push(ReportRow {
                    repository_url: reference.repository_url.clone(),
                    pinned_ref: reference.pinned_ref_str().to_string(),
                    updates_available: resolution.display(self.mode),
                    origin_file,
                    is_major_upgrade: self.flag_major_upgrades.then_some(resolution.is_major_upgrade),
                }),
                Err(failure) => {
                    tracing::warn!(
                        module = %reference.name,
                        url = %failure.repository_url,
                        timed_out = failure.timed_out,
                        "Repository unreachable, recording failure"
                    );
                    self.result.failures.push(FailureRow {
                        repository_url: reference.repository_url.clone(),
                        pinned_ref: reference.pinned_ref_str().to_string(),
                        updates_available: String::new(),
                        origin_file,
                        error: failure.message,
                    });
                }
            }
        }

        progress.finish_and_clear();
    }

    fn finish(mut self) -> ScanResult {
        self.result.repositories_contacted = self.resolver.contacted();
        self.result
    }
}

impl Scanner {
    /// Create a new scanner with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let git_client = GitClient::new(&config.git);
        Self { config, git_client }
    }

    /// Report newer tags for every git-sourced module under `root`.
    ///
    /// Repositories that cannot be reached end up in
    /// [`ScanResult::failures`]; they do not fail the run.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the output format is not supported
    /// - `root` doesn't exist or a directory cannot be listed
    pub async fn check(&self, root: &Path) -> Result<ScanResult> {
        self.config.validate()?;
        let mode = if self.config.output.latest_only {
            ResolutionMode::LatestOnly
        } else {
            ResolutionMode::AllUpdates
        };
        let mut ctx = RunContext::new(self.git_client.clone(), mode, self.config.output.flag_major_upgrades);

        let parser = HclParser::new();
        for dir in DirectoryWalker::new(&self.config.scan).directories(root)? {
            tracing::info!(dir = %dir.display(), "Scanning directory");
            let references = parser.parse_directory(&dir).await?;
            ctx.resolve_all(&dir, &references).await;
            ctx.result.references.extend(references);
            ctx.result.directories_scanned.push(dir);
        }

        let result = ctx.finish();
        tracing::info!(
            directories = result.directories_scanned.len(),
            modules = result.references.len(),
            outdated = result.outdated(),
            failures = result.failures.len(),
            repositories = result.repositories_contacted,
            "Check complete"
        );
        Ok(result)
    }

    /// Pin every git-sourced module under `root` to its newest tag, then
    /// commit the rewritten files on a dated branch.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` doesn't exist or a directory cannot be
    /// listed. Failing to commit is reported in [`ScanResult::commit`].
    pub async fn update(&self, root: &Path) -> Result<ScanResult> {
        self.config.validate()?;
        let mut ctx = RunContext::new(self.git_client.clone(), ResolutionMode::LatestOnly, true);

        let parser = HclParser::new();
        let formatter = Formatter::new(&self.config.formatter);

        for dir in DirectoryWalker::new(&self.config.scan).directories(root)? {
            tracing::info!(dir = %dir.display(), "Updating directory");
            formatter.format(&dir).await;

            let references = parser.parse_directory(&dir).await?;
            ctx.resolve_all(&dir, &references).await;

            let mut by_file: BTreeMap<&Path, Vec<ModuleSourceReference>> = BTreeMap::new();
            for reference in &references {
                by_file
                    .entry(reference.origin_file.as_path())
                    .or_default()
                    .push(reference.clone());
            }

            let mut applicator = UpdateApplicator::new(&mut ctx.resolver);
            for (file, file_references) in by_file {
                match applicator.apply(file, &file_references).await {
                    Ok(records) => ctx.result.mutations.extend(records),
                    Err(e) => tracing::warn!(file = %file.display(), error = %e, "Failed to update file"),
                }
            }

            ctx.result.references.extend(references);
            ctx.result.directories_scanned.push(dir);
        }

        let mut result = ctx.finish();

        if !self.config.commit.enabled {
            tracing::info!("Commit disabled, leaving changes in the working tree");
        } else if result.mutations.is_empty() {
            tracing::info!("No module refs changed, nothing to commit");
        } else {
            let root = root.to_path_buf();
            let options = self.config.commit.clone();
            let outcome = tokio::task::spawn_blocking(move || git::commit_changes(&root, &options))
                .await
                .map_err(|e| crate::err!(Internal {
                    message: format!("Commit task failed: {e}"),
                }))?;
            result.commit = Some(outcome);
        }

        tracing::info!(
            files = result.mutated_files().len(),
            mutations = result.mutations.len(),
            failures = result.failures.len(),
            "Update complete"
        );
        Ok(result)
    }

    /// Clone `url` and run [`update`](Self::update) inside the clone.
    ///
    /// The clone goes to `workdir`, or to a fresh directory under the system
    /// temp dir, and is left in place so the commit can be reviewed and pushed.
    ///
    /// # Errors
    ///
    /// Returns a clone failure if the repository cannot be cloned, otherwise
    /// the errors of [`update`](Self::update).
    pub async fn update_repository(&self, url: &str, workdir: Option<&Path>) -> Result<(PathBuf, ScanResult)> {
        let target = match workdir {
            Some(dir) => dir.to_path_buf(),
            None => default_workdir(url),
        };

        self.git_client.clone_to_working_directory(url, &target).await?;
        let result = self.update(&target).await?;
        Ok((target, result))
    }
}

fn default_workdir(url: &str) -> PathBuf {
    let name = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .map(|n| n.trim_end_matches(".git"))
        .filter(|n| !n.is_empty())
        .unwrap_or("repository");
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    std::env::temp_dir().join(format!("samwise-{name}-{stamp}"))
}

fn progress_bar(len: u64) -> ProgressBar {
    let progress = ProgressBar::new(len);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        progress.set_style(style.progress_chars("#>-"));
    }
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{InspectedRepository, MockRepositoryInspector};
    use crate::parser::HclParser;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scanner_creation() {
        let _scanner = Scanner::new(Config::default());
    }

    #[test]
    fn test_default_workdir_name() {
        let dir = default_workdir("git@github.com:org/infra-live.git");
        let name = dir.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("samwise-infra-live-"));
    }

    #[tokio::test]
    async fn test_run_context_rows_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.tf"),
            r#"
module "vpc" {
  source = "git::https://github.com/org/vpc.git?ref=v1.0.0"
}
module "vpc_again" {
  source = "git::https://github.com/org/vpc.git?ref=v1.0.0"
}
module "private" {
  source = "git@github.com:org/private.git?ref=v1.0.0"
}
module "local" {
  source = "../modules/local"
}
"#,
        )
        .unwrap();
        let references = HclParser::new().parse_directory(dir.path()).await.unwrap();

        let mut inspector = MockRepositoryInspector::new();
        inspector
            .expect_inspect()
            .withf(|url| url == "https://github.com/org/vpc.git")
            .times(1)
            .returning(|url| Ok(InspectedRepository::with_tags(url, ["v1.0.0", "v1.1.0", "v2.0.0"])));
        inspector
            .expect_inspect()
            .withf(|url| url == "git@github.com:org/private.git")
            .times(1)
            .returning(|url| {
                Err(crate::err!(GitAuth {
                    url: url.to_string(),
                    message: "denied".to_string(),
                }))
            });

        let mut ctx = RunContext::new(inspector, ResolutionMode::AllUpdates, true);
        ctx.resolve_all(dir.path(), &references).await;
        let result = ctx.finish();

        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].updates_available, "v1.1.0|v2.0.0");
        assert_eq!(result.rows[0].is_major_upgrade, Some(true));
        assert_eq!(result.failures.len(), 1);
        assert!(result.failures[0].error.contains("denied"));
        assert_eq!(result.repositories_contacted, 2);
    }
}
