//! Module source string parsing.
//!
//! Splits a `source = "..."` value into the repository URL, the `ref=` pin
//! and the `//` sub-module path.
//!
//! # Supported Source Shapes
//!
//! - **SSH**: `git@github.com:org/repo.git`, `git::ssh://git@host/org/repo.git`
//! - **Generic git**: `git::https://host/org/repo.git`
//! - **GitHub shorthand**: `github.com/org/repo`
//! - **HTTPS**: `https://host/org/repo.git`
//! - **Bitbucket**: `bitbucket.org/org/repo`
//!
//! Registry and local sources are not version-controlled references and parse
//! to an empty result.

use crate::git::is_ssh_url;
use crate::types::SourceKind;
use regex::Regex;
use std::sync::LazyLock;

/// Shapes tried in order for sources not reached over SSH; the first match wins.
static SOURCE_PATTERNS: LazyLock<Vec<(SourceKind, Regex)>> = LazyLock::new(|| {
    [
        (SourceKind::GenericGit, r"^git::(.+)$"),
        (SourceKind::GitHub, r"^(github\.com/.+)$"),
        (SourceKind::Https, r"^(https://.+)$"),
        (SourceKind::Bitbucket, r"(bitbucket\.org/.+)$"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("Invalid regex")))
    .collect()
});

static REF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // ?ref=v1.0.0, &ref=v1.0.0 ending at &, a // marker or the end
    Regex::new(r"[?&]ref=(.*?)(?:&|//|$)").expect("Invalid regex")
});

/// The pieces of a module source string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSourceParts {
    pub repository_url: String,
    pub git_ref: Option<String>,
    pub sub_module_path: Option<String>,
    pub kind: SourceKind,
}

impl ModuleSourceParts {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.repository_url.is_empty()
    }
}

/// Parse a module source string. Never fails; unrecognised shapes come back
/// empty.
///
/// # Examples
///
/// ```rust
/// use samwise::parser::parse_module_source;
///
/// let parts = parse_module_source(r#""git::https://github.com/org/repo.git//modules/vpc?ref=v1.2.0""#);
/// assert_eq!(parts.repository_url, "https://github.com/org/repo.git");
/// assert_eq!(parts.git_ref.as_deref(), Some("v1.2.0"));
/// assert_eq!(parts.sub_module_path.as_deref(), Some("modules/vpc"));
///
/// assert!(parse_module_source("terraform-aws-modules/vpc/aws").is_empty());
/// ```
#[must_use]
pub fn parse_module_source(raw: &str) -> ModuleSourceParts {
    let cleaned = clean_expression(raw);
    if cleaned.is_empty() {
        return ModuleSourceParts::default();
    }

    let unprefixed = cleaned.strip_prefix("git::").unwrap_or(&cleaned);
    let (kind, locator) = if is_ssh_url(unprefixed) {
        (SourceKind::Ssh, unprefixed)
    } else {
        match classify(&cleaned) {
            Some(found) => found,
            None => {
                tracing::debug!(source = %cleaned, "Not a version-controlled module source");
                return ModuleSourceParts::default();
            }
        }
    };

    let (base, sub_path) = split_sub_path(locator);
    let repository_url = strip_query(base).to_string();
    if repository_url.is_empty() {
        return ModuleSourceParts::default();
    }

    ModuleSourceParts {
        repository_url,
        git_ref: extract_ref(&cleaned),
        sub_module_path: sub_path.map(strip_query).filter(|s| !s.is_empty()).map(String::from),
        kind,
    }
}

/// Drops whitespace, a leading `source=` and surrounding quotes.
fn clean_expression(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = compact.strip_prefix("source=").unwrap_or(&compact);
    compact.trim_matches(|c| c == '"' || c == '\'').to_string()
}

fn classify(cleaned: &str) -> Option<(SourceKind, &str)> {
    SOURCE_PATTERNS.iter().find_map(|(kind, pattern)| {
        pattern
            .captures(cleaned)
            .and_then(|c| c.get(1))
            .map(|m| (*kind, m.as_str()))
    })
}

/// Splits at the first `//` that is not part of `scheme://`.
fn split_sub_path(locator: &str) -> (&str, Option<&str>) {
    let start = locator.find("://").map_or(0, |i| i + 3);
    match locator[start..].find("//") {
        Some(offset) => {
            let at = start + offset;
            (&locator[..at], Some(&locator[at + 2..]))
        }
        None => (locator, None),
    }
}

fn strip_query(s: &str) -> &str {
    s.split_once('?').map_or(s, |(head, _)| head)
}

fn extract_ref(cleaned: &str) -> Option<String> {
    REF_PATTERN
        .captures(cleaned)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|r| !r.is_empty())
}
