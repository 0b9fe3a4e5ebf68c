//! Git access layer.
//!
//! Everything that talks to a repository goes through here:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         GitClient                            │
//! │  - normalizes URLs (scp form for SSH, https:// for bare)     │
//! │  - picks SSH key or HTTPS basic auth from the URL shape      │
//! │  - bounds every network call by a deadline                   │
//! └──────────────────────────────────────────────────────────────┘
//!        │ clone_for_inspection            │ clone_to_working_directory
//!        ▼                                 ▼
//!  InspectedRepository               git2::Repository
//!  (advertised refs only,            (full clone with a
//!   nothing written to disk)          working tree)
//!        │                                 │
//!        └──────────── TagSource ──────────┘
//!                          │
//!                          ▼
//!                     TagListing
//! ```
//!
//! The commit workflow in [`commit`] works on a local repository and never
//! touches the network.
//!
//! # Example
//!
//! ```rust,no_run
//! use samwise::git::{GitClient, RepositoryInspector, TagSource};
//! use samwise::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = GitClient::new(&Config::default().git);
//!     let repo = client.inspect("https://github.com/org/terraform-vpc.git").await?;
//!     println!("{:?}", repo.list_tags());
//!     Ok(())
//! }
//! ```

mod auth;
mod client;
pub mod commit;

pub(crate) use auth::is_ssh_url;
pub use auth::{select_auth, AuthStrategy, CredentialContext};
pub use client::{normalize_url, set_transport_timeouts, GitClient};
pub use commit::{commit_changes, CommitOutcome, CommitStep};

use crate::error::Result;
use crate::version::VersionTag;
use async_trait::async_trait;
use std::collections::HashSet;

/// Tags of a repository, or the reason they could not be enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagListing {
    /// Tags in enumeration order, de-duplicated
    Listed(Vec<VersionTag>),
    /// The repository was reached but its tags could not be read
    Unavailable { reason: String },
}

impl TagListing {
    /// Build a listing from full ref names, keeping only `refs/tags/*`.
    ///
    /// Peeled entries (`refs/tags/v1.0.0^{}`) collapse onto their tag.
    #[must_use]
    pub fn from_ref_names<I, S>(refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let tags = refs
            .into_iter()
            .filter_map(|r| {
                let tag = r.as_ref().strip_prefix("refs/tags/")?;
                let tag = tag.strip_suffix("^{}").unwrap_or(tag);
                seen.insert(tag.to_string()).then(|| VersionTag::new(tag))
            })
            .collect();
        Self::Listed(tags)
    }
}

/// Anything tags can be read from.
pub trait TagSource {
    fn list_tags(&self) -> TagListing;
}

/// Result of [`GitClient::clone_for_inspection`]: the refs a remote advertised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectedRepository {
    /// URL that was contacted, after normalization
    pub url: String,

    /// Advertised ref names, or why the advertisement could not be read
    pub advertised: std::result::Result<Vec<String>, String>,
}

impl InspectedRepository {
    /// An inspection that saw exactly these tags.
    #[must_use]
    pub fn with_tags<I, S>(url: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            url: url.into(),
            advertised: Ok(tags
                .into_iter()
                .map(|t| format!("refs/tags/{}", t.as_ref()))
                .collect()),
        }
    }
}

impl TagSource for InspectedRepository {
    fn list_tags(&self) -> TagListing {
        match &self.advertised {
            Ok(refs) => TagListing::from_ref_names(refs),
            Err(reason) => TagListing::Unavailable { reason: reason.clone() },
        }
    }
}

impl TagSource for git2::Repository {
    fn list_tags(&self) -> TagListing {
        match self.tag_names(None) {
            Ok(names) => TagListing::Listed(names.iter().flatten().map(VersionTag::from).collect()),
            Err(e) => TagListing::Unavailable { reason: e.message().to_string() },
        }
    }
}

/// Reaches a remote repository and reports what it advertises.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepositoryInspector: Send + Sync {
    /// # Errors
    ///
    /// Returns a clone failure (`GitClone`, `GitAuth`, `GitTimeout`,
    /// `InvalidGitUrl`) if the remote cannot be reached.
    async fn inspect(&self, url: &str) -> Result<InspectedRepository>;
}
