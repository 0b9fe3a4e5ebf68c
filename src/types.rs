//! Core data types used throughout samwise.
//!
//! This module defines the fundamental data structures for representing:
//! - module source references found in Terraform files
//! - the outcome of resolving a reference against its remote tags
//! - report rows, failure rows and in-place file mutations
//! - the accumulated result of one run

use crate::git::CommitOutcome;
use crate::version::VersionTag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Shown in place of versions when a repository's tags could not be listed.
pub const TAGS_UNAVAILABLE: &str = "tags unavailable";

/// Shape a module source was recognised as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// `user@host:path` or `ssh://user@host/path`, with or without `git::`.
    /// `https://user@host/...` is still [`SourceKind::Https`].
    Ssh,
    /// `git::https://...`, `git::file://...`
    GenericGit,
    /// `github.com/org/repo`
    GitHub,
    /// `https://...`
    Https,
    /// `...bitbucket.org/...`
    Bitbucket,
    /// Registry paths, local paths and everything else
    #[default]
    Unknown,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ssh => write!(f, "ssh"),
            Self::GenericGit => write!(f, "generic_git"),
            Self::GitHub => write!(f, "github"),
            Self::Https => write!(f, "https"),
            Self::Bitbucket => write!(f, "bitbucket"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A `module` block whose `source` points at a version-controlled repository.
///
/// # Example HCL
///
/// ```hcl
/// module "vpc" {
///   source = "git::https://github.com/org/terraform-vpc.git//modules/vpc?ref=v1.2.0"
/// }
/// ```
///
/// A reference with an empty `repository_url` is inert: it is neither
/// resolved nor reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSourceReference {
    /// The label of the module block (e.g., "vpc")
    pub name: String,

    /// The quoted source literal exactly as it appears in the file
    pub raw_expression: String,

    /// Repository URL with query and sub-path removed
    pub repository_url: String,

    /// Value of the `ref=` query parameter
    pub pinned_ref: Option<String>,

    /// Path after the `//` marker
    pub sub_module_path: Option<String>,

    pub source_kind: SourceKind,

    /// File where this module is defined
    pub origin_file: PathBuf,

    /// 1-based line of the `source` attribute, 0 if it could not be located
    pub line_number: usize,
}

impl ModuleSourceReference {
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.repository_url.is_empty()
    }

    /// Pinned ref, or the empty string when the source has none.
    #[must_use]
    pub fn pinned_ref_str(&self) -> &str {
        self.pinned_ref.as_deref().unwrap_or_default()
    }
}

/// How an [`UpdateResolution`] is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    /// Every newer tag, in remote enumeration order
    #[default]
    AllUpdates,
    /// Only the greatest newer tag
    LatestOnly,
}

/// Newer tags found for one `(repository, pinned ref)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResolution {
    pub repository_url: String,
    pub pinned_ref: String,

    /// Tags strictly greater than `pinned_ref`, in enumeration order
    pub newer_tags: Vec<VersionTag>,

    /// Greatest of `newer_tags`, `None` when nothing is newer
    pub latest: Option<VersionTag>,

    /// Whether `latest` has a higher leading version component than `pinned_ref`
    pub is_major_upgrade: bool,

    /// Tag enumeration failed and `newer_tags` is empty for that reason
    pub tags_unavailable: bool,
}

impl UpdateResolution {
    #[must_use]
    pub fn has_updates(&self) -> bool {
        self.latest.is_some()
    }

    /// Value shown in the `updates_available` column.
    #[must_use]
    pub fn display(&self, mode: ResolutionMode) -> String {
        if self.tags_unavailable {
            return TAGS_UNAVAILABLE.to_string();
        }
        match mode {
            ResolutionMode::AllUpdates => self
                .newer_tags
                .iter()
                .map(VersionTag::as_str)
                .collect::<Vec<_>>()
                .join("|"),
            ResolutionMode::LatestOnly => self
                .latest
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        }
    }
}

/// A pair that could not be resolved. Stored in the run memo, so it is
/// plain data rather than the originating error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionFailure {
    pub repository_url: String,
    pub pinned_ref: String,
    pub message: String,
    pub timed_out: bool,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A single in-place rewrite of a source expression.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileMutationRecord {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub before_expression: String,
    pub after_expression: String,
}

/// One line of the module report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    #[serde(rename = "repo_link")]
    pub repository_url: String,

    #[serde(rename = "current_version")]
    pub pinned_ref: String,

    #[serde(rename = "updates_available")]
    pub updates_available: String,

    #[serde(rename = "file_name")]
    pub origin_file: String,

    /// Only present when major upgrades are flagged
    #[serde(rename = "major_upgrade", skip_serializing_if = "Option::is_none", default)]
    pub is_major_upgrade: Option<bool>,
}

/// One line of the failure report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRow {
    #[serde(rename = "repo_link")]
    pub repository_url: String,

    #[serde(rename = "current_version")]
    pub pinned_ref: String,

    #[serde(rename = "updates_available")]
    pub updates_available: String,

    #[serde(rename = "file_name")]
    pub origin_file: String,

    pub error: String,
}

/// Everything a run produced.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Directories visited by the walker
    pub directories_scanned: Vec<PathBuf>,

    /// Every module reference found, inert ones included
    pub references: Vec<ModuleSourceReference>,

    pub rows: Vec<ReportRow>,

    pub failures: Vec<FailureRow>,

    pub mutations: BTreeSet<FileMutationRecord>,

    /// Number of distinct `(repository, ref)` pairs contacted
    pub repositories_contacted: usize,

    /// Set in update mode once the commit step has run
    pub commit: Option<CommitOutcome>,
}

impl ScanResult {
    /// Rows that have at least one newer version.
    #[must_use]
    pub fn outdated(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| !r.updates_available.is_empty() && r.updates_available != TAGS_UNAVAILABLE)
            .count()
    }

    /// Files touched by the update applicator, each once.
    #[must_use]
    pub fn mutated_files(&self) -> BTreeSet<&PathBuf> {
        self.mutations.iter().map(|m| &m.file_path).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolution(tags: &[&str], latest: Option<&str>) -> UpdateResolution {
        UpdateResolution {
            repository_url: "https://github.com/org/repo".to_string(),
            pinned_ref: "v1.0.0".to_string(),
            newer_tags: tags.iter().copied().map(VersionTag::from).collect(),
            latest: latest.map(VersionTag::from),
            is_major_upgrade: false,
            tags_unavailable: false,
        }
    }

    #[test]
    fn test_display_all_updates_joins_with_pipe() {
        let r = resolution(&["v1.0.2", "v1.0.3-beta"], Some("v1.0.3-beta"));
        assert_eq!(r.display(ResolutionMode::AllUpdates), "v1.0.2|v1.0.3-beta");
        assert_eq!(r.display(ResolutionMode::LatestOnly), "v1.0.3-beta");
    }

    #[test]
    fn test_display_no_updates_is_empty() {
        let r = resolution(&[], None);
        assert!(!r.has_updates());
        assert_eq!(r.display(ResolutionMode::AllUpdates), "");
        assert_eq!(r.display(ResolutionMode::LatestOnly), "");
    }

    #[test]
    fn test_display_unavailable_tags() {
        let mut r = resolution(&[], None);
        r.tags_unavailable = true;
        assert_eq!(r.display(ResolutionMode::AllUpdates), TAGS_UNAVAILABLE);
        assert_eq!(r.display(ResolutionMode::LatestOnly), TAGS_UNAVAILABLE);
    }

    #[test]
    fn test_mutation_records_deduplicate() {
        let record = FileMutationRecord {
            file_path: PathBuf::from("main.tf"),
            line_number: 3,
            before_expression: "\"git::https://x/y.git?ref=v1\"".to_string(),
            after_expression: "\"git::https://x/y.git?ref=v2\"".to_string(),
        };
        let mut result = ScanResult::default();
        result.mutations.insert(record.clone());
        result.mutations.insert(record);
        assert_eq!(result.mutations.len(), 1);
        assert_eq!(result.mutated_files().len(), 1);
    }

    #[test]
    fn test_report_row_json_keys() {
        let row = ReportRow {
            repository_url: "https://github.com/org/repo".to_string(),
            pinned_ref: "v1.0.0".to_string(),
            updates_available: "v1.1.0".to_string(),
            origin_file: "main.tf".to_string(),
            is_major_upgrade: None,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["repo_link"], "https://github.com/org/repo");
        assert_eq!(json["current_version"], "v1.0.0");
        assert!(json.get("major_upgrade").is_none());
    }
}
