//! Credential selection and libgit2 callbacks.

use crate::config::{GitOptions, HostKeyPolicy};
use git2::{CertificateCheckStatus, Cred, CredentialType, RemoteCallbacks};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// libgit2 asks again after a rejected credential; give up after this many.
const MAX_CREDENTIAL_ATTEMPTS: u32 = 3;

/// Credentials available to a run. Loaded once and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct CredentialContext {
    pub http_username: Option<String>,
    pub http_password: Option<String>,
    pub ssh_private_key_path: PathBuf,
    pub ssh_key_passphrase: Option<String>,
    pub host_key_policy: HostKeyPolicy,
}

impl CredentialContext {
    #[must_use]
    pub fn from_options(options: &GitOptions) -> Self {
        Self {
            http_username: options.username.clone(),
            http_password: options.password.clone(),
            ssh_private_key_path: options.resolved_ssh_key_path(),
            ssh_key_passphrase: options.ssh_key_passphrase.clone(),
            host_key_policy: options.host_key_policy,
        }
    }
}

/// How a particular URL authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    Ssh {
        username: String,
        private_key_path: PathBuf,
        passphrase: Option<String>,
        host_key_policy: HostKeyPolicy,
    },
    HttpBasic {
        username: Option<String>,
        password: Option<String>,
    },
}

/// Picks SSH key auth for `user@host` URLs and HTTPS basic auth otherwise.
///
/// An `http(s)://user@host/...` URL is still HTTPS. Pure; performs no I/O.
#[must_use]
pub fn select_auth(url: &str, credentials: &CredentialContext) -> AuthStrategy {
    if is_ssh_url(url) {
        AuthStrategy::Ssh {
            username: ssh_username(url),
            private_key_path: credentials.ssh_private_key_path.clone(),
            passphrase: credentials.ssh_key_passphrase.clone(),
            host_key_policy: credentials.host_key_policy,
        }
    } else {
        AuthStrategy::HttpBasic {
            username: credentials.http_username.clone(),
            password: credentials.http_password.clone(),
        }
    }
}

pub(crate) fn is_ssh_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("https://") || lower.starts_with("http://") || lower.starts_with("file://") {
        return false;
    }
    lower.starts_with("ssh://") || url.contains('@')
}

/// Text before `@` with any `ssh://` removed; `git` if there is none.
fn ssh_username(url: &str) -> String {
    let rest = url.strip_prefix("ssh://").unwrap_or(url);
    match rest.split_once('@') {
        Some((user, _)) if !user.is_empty() && !user.contains('/') => user.to_string(),
        _ => "git".to_string(),
    }
}

/// Callbacks for one clone or inspection.
///
/// Transfer progress aborts once `deadline` has passed and records that in
/// `timed_out`, so the caller can report a timeout rather than a plain failure.
pub(crate) fn remote_callbacks<'a>(
    strategy: &'a AuthStrategy,
    deadline: Instant,
    timed_out: &'a AtomicBool,
) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = 0;

    callbacks.credentials(move |url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("credentials rejected"));
        }
        tracing::trace!(url = %url, attempt = attempts, allowed = ?allowed, "Credentials requested");

        match strategy {
            AuthStrategy::Ssh { username, private_key_path, passphrase, .. } => {
                let user = username_from_url.unwrap_or(username.as_str());
                if allowed.contains(CredentialType::USERNAME) {
                    return Cred::username(user);
                }
                Cred::ssh_key(user, None, private_key_path, passphrase.as_deref())
            }
            AuthStrategy::HttpBasic { username, password } => match password {
                Some(password) => {
                    let user = username.as_deref().or(username_from_url).unwrap_or("git");
                    Cred::userpass_plaintext(user, password)
                }
                None => Err(git2::Error::from_str(
                    "remote requires credentials but none are configured",
                )),
            },
        }
    });

    let policy = match strategy {
        AuthStrategy::Ssh { host_key_policy, .. } => *host_key_policy,
        AuthStrategy::HttpBasic { .. } => HostKeyPolicy::Strict,
    };
    callbacks.certificate_check(move |cert, host| {
        if policy == HostKeyPolicy::AcceptAny && cert.as_hostkey().is_some() {
            tracing::debug!(host = %host, "Accepting SSH host key without verification");
            return Ok(CertificateCheckStatus::CertificateOk);
        }
        Ok(CertificateCheckStatus::CertificatePassthrough)
    });

    callbacks.transfer_progress(move |_progress| within_deadline(deadline, timed_out));
    callbacks.sideband_progress(move |_data| within_deadline(deadline, timed_out));

    callbacks
}

fn within_deadline(deadline: Instant, timed_out: &AtomicBool) -> bool {
    if Instant::now() >= deadline {
        timed_out.store(true, Ordering::Relaxed);
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn credentials() -> CredentialContext {
        CredentialContext {
            http_username: Some("frodo".to_string()),
            http_password: Some("token".to_string()),
            ssh_private_key_path: PathBuf::from("/home/frodo/.ssh/id_ed25519"),
            ssh_key_passphrase: None,
            host_key_policy: HostKeyPolicy::Strict,
        }
    }

    #[test_case("git@github.com:org/repo.git", "git" ; "scp form")]
    #[test_case("ssh://deploy@git.example.com:2222/org/repo.git", "deploy" ; "ssh url with port")]
    #[test_case("ssh://git.example.com/org/repo.git", "git" ; "ssh url without user")]
    fn test_select_ssh(url: &str, user: &str) {
        match select_auth(url, &credentials()) {
            AuthStrategy::Ssh { username, private_key_path, host_key_policy, .. } => {
                assert_eq!(username, user);
                assert_eq!(private_key_path, PathBuf::from("/home/frodo/.ssh/id_ed25519"));
                assert_eq!(host_key_policy, HostKeyPolicy::Strict);
            }
            other => panic!("Expected SSH, got {other:?}"),
        }
    }

    #[test_case("https://github.com/org/repo.git" ; "https")]
    #[test_case("github.com/org/repo" ; "bare host")]
    #[test_case("https://oauth2@gitlab.com/org/repo.git" ; "https with user")]
    #[test_case("file:///tmp/repo" ; "local file")]
    fn test_select_http(url: &str) {
        assert_eq!(
            select_auth(url, &credentials()),
            AuthStrategy::HttpBasic {
                username: Some("frodo".to_string()),
                password: Some("token".to_string()),
            }
        );
    }

    #[test]
    fn test_deadline_flag() {
        let flag = AtomicBool::new(false);
        assert!(within_deadline(Instant::now() + std::time::Duration::from_secs(60), &flag));
        assert!(!flag.load(Ordering::Relaxed));
        assert!(!within_deadline(Instant::now(), &flag));
        assert!(flag.load(Ordering::Relaxed));
    }
}
