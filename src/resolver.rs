//! Version resolution.
//!
//! Turns a `(repository, pinned ref)` pair into the list of newer tags. Each
//! pair is inspected at most once per run; later lookups, failures included,
//! come from the memo.

use crate::error::SamwiseError;
use crate::git::{RepositoryInspector, TagListing, TagSource};
use crate::types::{ResolutionFailure, UpdateResolution};
use crate::version::{greatest_of, is_greater, is_major_upgrade, VersionTag};
use std::collections::BTreeMap;

type Outcome = std::result::Result<UpdateResolution, ResolutionFailure>;

/// Resolves pinned refs against remote tags, memoizing per run.
pub struct VersionResolver<I> {
    inspector: I,
    memo: BTreeMap<(String, String), Outcome>,
}

impl<I: RepositoryInspector> VersionResolver<I> {
    #[must_use]
    pub fn new(inspector: I) -> Self {
        Self {
            inspector,
            memo: BTreeMap::new(),
        }
    }

    /// Newer tags of `repository_url` relative to `pinned_ref`.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionFailure`] if the repository could not be reached.
    /// The failure is remembered and returned again for the same pair.
    pub async fn resolve(&mut self, repository_url: &str, pinned_ref: &str) -> Outcome {
        let key = (repository_url.to_string(), pinned_ref.to_string());
        if let Some(outcome) = self.memo.get(&key) {
            tracing::trace!(url = %repository_url, pinned = %pinned_ref, "Resolution served from memo");
            return outcome.clone();
        }

        let outcome = match self.inspector.inspect(repository_url).await {
            Ok(repo) => Ok(compute(repository_url, pinned_ref, repo.list_tags())),
            Err(e) => Err(failure(repository_url, pinned_ref, &e)),
        };

        match &outcome {
            Ok(resolution) => tracing::debug!(
                url = %repository_url,
                pinned = %pinned_ref,
                newer = resolution.newer_tags.len(),
                latest = ?resolution.latest.as_ref().map(VersionTag::as_str),
                "Resolved module versions"
            ),
            Err(f) => tracing::warn!(url = %repository_url, pinned = %pinned_ref, error = %f, "Failed to resolve module versions"),
        }

        self.memo.insert(key, outcome.clone());
        outcome
    }

    /// Distinct pairs inspected so far.
    #[must_use]
    pub fn contacted(&self) -> usize {
        self.memo.len()
    }
}

fn compute(repository_url: &str, pinned_ref: &str, listing: TagListing) -> UpdateResolution {
    let (tags, tags_unavailable) = match listing {
        TagListing::Listed(tags) => (tags, false),
        TagListing::Unavailable { reason } => {
            tracing::warn!(url = %repository_url, reason = %reason, "Tags unavailable, treating as none");
            (Vec::new(), true)
        }
    };

    let newer_tags: Vec<VersionTag> = tags
        .into_iter()
        .filter(|tag| is_greater(tag.as_str(), pinned_ref))
        .collect();

    let latest = (!newer_tags.is_empty()).then(|| greatest_of(&newer_tags));
    let is_major = latest
        .as_ref()
        .is_some_and(|latest| is_major_upgrade(pinned_ref, latest.as_str()));

    UpdateResolution {
        repository_url: repository_url.to_string(),
        pinned_ref: pinned_ref.to_string(),
        newer_tags,
        latest,
        is_major_upgrade: is_major,
        tags_unavailable,
    }
}

fn failure(repository_url: &str, pinned_ref: &str, error: &SamwiseError) -> ResolutionFailure {
    ResolutionFailure {
        repository_url: repository_url.to_string(),
        pinned_ref: pinned_ref.to_string(),
        message: error.to_string(),
        timed_out: matches!(error, SamwiseError::GitTimeout { .. }),
    }
}
