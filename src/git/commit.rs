//! Commit workflow for update mode.
//!
//! Runs `Open → Branch → Stage → Commit` against the repository containing
//! the updated files. Any step failing aborts the workflow with an
//! [`CommitOutcome::Aborted`]; the run itself carries on.

use crate::config::CommitOptions;
use chrono::NaiveDate;
use git2::{BranchType, IndexAddOption, Repository, Signature};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Message of every commit made by the update workflow.
pub const COMMIT_MESSAGE: &str = "chore(deps): update terraform module versions";

/// Workflow step, reported when the workflow aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStep {
    Open,
    Branch,
    Stage,
    Commit,
}

impl fmt::Display for CommitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Branch => write!(f, "branch"),
            Self::Stage => write!(f, "stage"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// How the workflow ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
    Committed { branch: String, commit_id: String },
    /// The staged tree equals the branch tip
    NothingToCommit { branch: String },
    Aborted { step: CommitStep, reason: String },
}

impl fmt::Display for CommitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Committed { branch, commit_id } => {
                let short = commit_id.get(..7).unwrap_or(commit_id);
                write!(f, "committed {short} on {branch}")
            }
            Self::NothingToCommit { branch } => write!(f, "nothing to commit on {branch}"),
            Self::Aborted { step, reason } => write!(f, "aborted at {step}: {reason}"),
        }
    }
}

/// `<prefix>-<YYYY-MM-DD>`
#[must_use]
pub fn branch_name(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix}-{}", date.format("%Y-%m-%d"))
}

/// Commit every change in the work tree containing `root` on today's branch.
///
/// Never pushes. Blocking; call from `spawn_blocking` in async code.
#[must_use]
pub fn commit_changes(root: &Path, options: &CommitOptions) -> CommitOutcome {
    let branch = branch_name(&options.branch_prefix, chrono::Local::now().date_naive());
    let outcome = run(root, &branch, options);

    match &outcome {
        CommitOutcome::Committed { branch, commit_id } => {
            tracing::info!(branch = %branch, commit = %commit_id, "Changes committed");
        }
        CommitOutcome::NothingToCommit { branch } => {
            tracing::info!(branch = %branch, "Nothing to commit");
        }
        CommitOutcome::Aborted { step, reason } => {
            tracing::warn!(step = %step, reason = %reason, root = %root.display(), "Commit workflow aborted");
        }
    }
    outcome
}

fn run(root: &Path, branch: &str, options: &CommitOptions) -> CommitOutcome {
    let aborted = |step: CommitStep| {
        move |e: git2::Error| CommitOutcome::Aborted {
            step,
            reason: e.message().to_string(),
        }
    };

    let repo = match Repository::discover(root) {
        Ok(repo) => repo,
        Err(e) => return aborted(CommitStep::Open)(e),
    };
    if repo.is_bare() {
        return CommitOutcome::Aborted {
            step: CommitStep::Open,
            reason: "repository has no working tree".to_string(),
        };
    }
    tracing::debug!(repo = %repo.path().display(), branch = %branch, "Opened repository");

    if let Err(e) = switch_branch(&repo, branch) {
        return aborted(CommitStep::Branch)(e);
    }

    let tree_id = match stage_all(&repo) {
        Ok(id) => id,
        Err(e) => return aborted(CommitStep::Stage)(e),
    };

    match commit(&repo, tree_id, options) {
        Ok(Some(id)) => CommitOutcome::Committed {
            branch: branch.to_string(),
            commit_id: id.to_string(),
        },
        Ok(None) => CommitOutcome::NothingToCommit {
            branch: branch.to_string(),
        },
        Err(e) => aborted(CommitStep::Commit)(e),
    }
}

/// Create `branch` at HEAD, or check it out if it exists, keeping local changes.
fn switch_branch(repo: &Repository, branch: &str) -> Result<(), git2::Error> {
    let reference = format!("refs/heads/{branch}");

    match repo.find_branch(branch, BranchType::Local) {
        Ok(existing) => {
            let target = existing.get().peel(git2::ObjectType::Commit)?;
            let mut checkout = git2::build::CheckoutBuilder::new();
            checkout.safe();
            repo.checkout_tree(&target, Some(&mut checkout))?;
            tracing::debug!(branch = %branch, "Checked out existing branch");
        }
        Err(e) if e.code() == git2::ErrorCode::NotFound => {
            let head = repo.head()?.peel_to_commit()?;
            repo.branch(branch, &head, false)?;
            tracing::debug!(branch = %branch, base = %head.id(), "Created branch");
        }
        Err(e) => return Err(e),
    }

    repo.set_head(&reference)
}

fn stage_all(repo: &Repository) -> Result<git2::Oid, git2::Error> {
    let mut index = repo.index()?;
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
    index.update_all(["*"].iter(), None)?;
    index.write()?;
    index.write_tree()
}

fn commit(repo: &Repository, tree_id: git2::Oid, options: &CommitOptions) -> Result<Option<git2::Oid>, git2::Error> {
    let parent = repo.head()?.peel_to_commit()?;
    if parent.tree_id() == tree_id {
        return Ok(None);
    }

    let tree = repo.find_tree(tree_id)?;
    let signature = Signature::now(&options.author_name, &options.author_email)?;
    repo.commit(Some("HEAD"), &signature, &signature, COMMIT_MESSAGE, &tree, &[&parent])
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn init_repo(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        fs::write(dir.join("main.tf"), "module \"a\" {}\n").unwrap();
        {
            let mut index = repo.index().unwrap();
            index.add_path(Path::new("main.tf")).unwrap();
            index.write().unwrap();
            let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
            let sig = Signature::now("t", "t@example.com").unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[]).unwrap();
        }
        repo
    }

    #[test]
    fn test_branch_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(branch_name("samwise/module-updates", date), "samwise/module-updates-2024-03-07");
    }

    #[test]
    fn test_commit_changes_on_dated_branch() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        fs::write(dir.path().join("main.tf"), "module \"a\" { source = \"x\" }\n").unwrap();

        let outcome = commit_changes(dir.path(), &CommitOptions::default());
        let CommitOutcome::Committed { branch, commit_id } = outcome else {
            panic!("Expected commit, got {outcome:?}");
        };
        assert!(branch.starts_with("samwise/module-updates-"));

        let head = repo.head().unwrap();
        assert_eq!(head.shorthand(), Some(branch.as_str()));
        let commit = head.peel_to_commit().unwrap();
        assert_eq!(commit.id().to_string(), commit_id);
        assert_eq!(commit.message(), Some(COMMIT_MESSAGE));
        assert_eq!(commit.author().name(), Some("samwise"));
        assert_eq!(commit.author().email(), Some("samwise@localhost"));
    }

    #[test]
    fn test_nothing_to_commit() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());

        let outcome = commit_changes(dir.path(), &CommitOptions::default());
        assert!(matches!(outcome, CommitOutcome::NothingToCommit { .. }));
    }

    #[test]
    fn test_second_run_reuses_branch() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());

        fs::write(dir.path().join("main.tf"), "# one\n").unwrap();
        let first = commit_changes(dir.path(), &CommitOptions::default());
        fs::write(dir.path().join("main.tf"), "# two\n").unwrap();
        let second = commit_changes(dir.path(), &CommitOptions::default());

        let (CommitOutcome::Committed { branch: a, .. }, CommitOutcome::Committed { branch: b, .. }) =
            (first, second)
        else {
            panic!("Expected two commits");
        };
        assert_eq!(a, b);
        let tip = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(tip.parent_count(), 1);
        assert_eq!(tip.parent(0).unwrap().message(), Some(COMMIT_MESSAGE));
    }

    #[test]
    fn test_outside_repository_aborts_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = commit_changes(dir.path(), &CommitOptions::default());
        assert!(matches!(outcome, CommitOutcome::Aborted { step: CommitStep::Open, .. }));
    }
}
