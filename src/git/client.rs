//! Git client implementation.
//!
//! All libgit2 work runs on the blocking pool under a deadline. The async
//! side gives up when the deadline passes. The blocking side stops at the next
//! transfer progress report, or when libgit2's own socket timeouts (see
//! [`set_transport_timeouts`]) expire during connect or handshake.

use crate::config::GitOptions;
use crate::error::{Result, SamwiseError};
use crate::git::auth::{is_ssh_url, remote_callbacks, select_auth, AuthStrategy, CredentialContext};
use crate::git::{InspectedRepository, RepositoryInspector};

use async_trait::async_trait;
use git2::{Direction, ErrorClass, ErrorCode, FetchOptions, Remote, Repository};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use url::Url;

/// Git client for listing remote tags and cloning repositories.
#[derive(Debug, Clone)]
pub struct GitClient {
    credentials: CredentialContext,
    timeout: Duration,
}

impl GitClient {
    /// Create a new Git client from the `git` configuration section.
    #[must_use]
    pub fn new(options: &GitOptions) -> Self {
        Self {
            credentials: CredentialContext::from_options(options),
            timeout: options.timeout(),
        }
    }

    /// Connects to the remote and lists the refs it advertises, the
    /// equivalent of `git ls-remote`. Nothing is written to disk.
    ///
    /// # Errors
    ///
    /// - `InvalidGitUrl` if the URL cannot be normalized
    /// - `GitAuth` if the remote rejects the credentials
    /// - `GitTimeout` if the deadline passes
    /// - `GitClone` for any other transport failure
    pub async fn clone_for_inspection(&self, url: &str) -> Result<InspectedRepository> {
        let normalized = normalize_url(url)?;
        let strategy = select_auth(&normalized, &self.credentials);
        let seconds = self.timeout.as_secs();

        tracing::debug!(url = %url, normalized = %normalized, ssh = is_ssh_url(&normalized), "Listing remote refs");

        self.with_deadline(url, move |deadline| {
            list_remote_refs(&normalized, &strategy, deadline, seconds)
        })
        .await
    }

    /// Full clone with a working tree at `target_path`.
    ///
    /// # Errors
    ///
    /// Same failure classes as [`Self::clone_for_inspection`].
    pub async fn clone_to_working_directory(&self, url: &str, target_path: &Path) -> Result<Repository> {
        let normalized = normalize_url(url)?;
        let strategy = select_auth(&normalized, &self.credentials);
        let seconds = self.timeout.as_secs();
        let target = target_path.to_path_buf();

        tracing::info!(url = %url, path = %target.display(), "Cloning repository");

        let repo = self
            .with_deadline(url, move |deadline| {
                clone_blocking(&normalized, &target, &strategy, deadline, seconds)
            })
            .await?;

        tracing::info!(path = %target_path.display(), "Repository cloned successfully");
        Ok(repo)
    }

    async fn with_deadline<T, F>(&self, url: &str, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Instant) -> Result<T> + Send + 'static,
    {
        let deadline = Instant::now() + self.timeout;
        let task = tokio::task::spawn_blocking(move || work(deadline));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(crate::err!(Internal {
                message: format!("Git task failed: {join_error}"),
            })),
            Err(_) => {
                tracing::warn!(url = %url, seconds = self.timeout.as_secs(), "Git operation timed out");
                Err(crate::err!(GitTimeout {
                    url: url.to_string(),
                    seconds: self.timeout.as_secs(),
                }))
            }
        }
    }
}

/// Bounds libgit2's socket connect and read calls by `timeout`, so a remote
/// that accepts a connection and then stalls also releases the blocking thread.
///
/// # Safety
///
/// Writes libgit2 globals without synchronization. Call it before any git2
/// work has started.
///
/// # Errors
///
/// Returns `Internal` if libgit2 rejects the option.
#[allow(unsafe_code)]
pub unsafe fn set_transport_timeouts(timeout: Duration) -> Result<()> {
    let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
    git2::opts::set_server_connect_timeout_in_milliseconds(millis)
        .and_then(|()| git2::opts::set_server_timeout_in_milliseconds(millis))
        .map_err(|e| crate::err!(Internal {
            message: format!("Failed to set git transport timeouts: {e}"),
        }))
}

#[async_trait]
impl RepositoryInspector for GitClient {
    async fn inspect(&self, url: &str) -> Result<InspectedRepository> {
        self.clone_for_inspection(url).await
    }
}

/// Normalize a repository URL for libgit2.
///
/// - SSH URLs become scp form `user@host:path`, except `ssh://` URLs with a
///   port, which scp syntax cannot express
/// - scheme-less URLs (`github.com/org/repo`) get `https://`
/// - `https://`, `http://`, `git://` and `file://` URLs pass through
///
/// # Errors
///
/// Returns `InvalidGitUrl` for an empty URL, an unparsable one or an
/// unsupported scheme.
pub fn normalize_url(url: &str) -> Result<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(crate::err!(InvalidGitUrl {
            url: String::new(),
            message: "empty repository URL".to_string(),
        }));
    }

    if is_ssh_url(url) {
        return normalize_ssh(url);
    }

    match Url::parse(url) {
        Ok(parsed) => match parsed.scheme() {
            "https" | "http" | "git" | "file" => Ok(url.to_string()),
            other => Err(crate::err!(InvalidGitUrl {
                url: url.to_string(),
                message: format!("unsupported scheme '{other}'"),
            })),
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let with_scheme = format!("https://{url}");
            Url::parse(&with_scheme).map_err(|e| crate::err!(InvalidGitUrl {
                url: url.to_string(),
                message: e.to_string(),
            }))?;
            Ok(with_scheme)
        }
        Err(e) => Err(crate::err!(InvalidGitUrl {
            url: url.to_string(),
            message: e.to_string(),
        })),
    }
}

fn normalize_ssh(url: &str) -> Result<String> {
    let invalid = |message: &str| {
        crate::err!(InvalidGitUrl {
            url: url.to_string(),
            message: message.to_string(),
        })
    };

    let Some(rest) = url.strip_prefix("ssh://") else {
        // already scp form, or user@host/path
        let (authority, path) = match url.split_once(':') {
            Some(parts) => parts,
            None => url.split_once('/').ok_or_else(|| invalid("missing repository path"))?,
        };
        if authority.is_empty() || path.is_empty() {
            return Err(invalid("missing host or repository path"));
        }
        return Ok(format!("{authority}:{}", path.trim_start_matches('/')));
    };

    let (authority, path) = rest
        .split_once('/')
        .ok_or_else(|| invalid("missing repository path"))?;
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    if host.is_empty() || path.is_empty() {
        return Err(invalid("missing host or repository path"));
    }
    if host.contains(':') {
        return Ok(url.to_string());
    }
    let authority = if authority.contains('@') {
        authority.to_string()
    } else {
        format!("git@{authority}")
    };
    Ok(format!("{authority}:{path}"))
}

fn list_remote_refs(
    url: &str,
    strategy: &AuthStrategy,
    deadline: Instant,
    seconds: u64,
) -> Result<InspectedRepository> {
    let timed_out = AtomicBool::new(false);
    let mut remote = Remote::create_detached(url).map_err(|e| classify(url, &e, false, seconds))?;

    let callbacks = remote_callbacks(strategy, deadline, &timed_out);
    let connection = remote
        .connect_auth(Direction::Fetch, Some(callbacks), None)
        .map_err(|e| classify(url, &e, timed_out.load(Ordering::Relaxed), seconds))?;

    let advertised = connection
        .list()
        .map(|heads| heads.iter().map(|h| h.name().to_string()).collect::<Vec<_>>())
        .map_err(|e| e.message().to_string());

    if let Ok(refs) = &advertised {
        tracing::debug!(url = %url, refs = refs.len(), "Remote refs listed");
    }

    Ok(InspectedRepository {
        url: url.to_string(),
        advertised,
    })
}

fn clone_blocking(
    url: &str,
    target: &Path,
    strategy: &AuthStrategy,
    deadline: Instant,
    seconds: u64,
) -> Result<Repository> {
    let timed_out = AtomicBool::new(false);
    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(remote_callbacks(strategy, deadline, &timed_out));

    let mut builder = git2::build::RepoBuilder::new();
    builder.fetch_options(fetch_options);

    tracing::debug!(url = %url, path = %target.display(), "Cloning repository");

    builder
        .clone(url, target)
        .map_err(|e| classify(url, &e, timed_out.load(Ordering::Relaxed), seconds))
}

fn classify(url: &str, error: &git2::Error, timed_out: bool, timeout_secs: u64) -> SamwiseError {
    if timed_out || error.code() == ErrorCode::Timeout {
        return crate::err!(GitTimeout {
            url: url.to_string(),
            seconds: timeout_secs,
        });
    }
    let detail = error.message().to_string();
    if error.code() == ErrorCode::Auth || error.code() == ErrorCode::Certificate || error.class() == ErrorClass::Ssh {
        crate::err!(GitAuth {
            url: url.to_string(),
            message: detail,
        })
    } else {
        crate::err!(GitClone {
            url: url.to_string(),
            message: detail,
        })
    }
}
