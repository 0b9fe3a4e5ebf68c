//! Version ordering over git tag names.
//!
//! Tags found on module repositories are loosely semantic: `v1.2.3`,
//! `1.2.3-beta`, `1.2` and plain garbage like `release-candidate` all show up.
//! Ordering follows semver precedence after a leading `v` is dropped and
//! missing minor/patch components are padded with zeros. Build metadata does
//! not take part in the ordering.
//!
//! Anything that does not parse is never greater than anything else, in either
//! direction, so comparisons are total and never panic.

use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seed for [`greatest_of`]; any parsable tag is greater.
pub const VERSION_FLOOR: &str = "v0.0.0";

/// A tag name as it appears on the remote, e.g. `v1.0.3-beta`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionTag(String);

impl VersionTag {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `self` is strictly newer than `baseline`.
    #[must_use]
    pub fn is_greater_than(&self, baseline: &Self) -> bool {
        is_greater(&self.0, &baseline.0)
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionTag {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for VersionTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Returns true only if both strings parse and `candidate` has strictly higher
/// precedence than `baseline`.
///
/// ```rust
/// use samwise::version::is_greater;
///
/// assert!(is_greater("v1.0.1", "1.0.0"));
/// assert!(is_greater("1.0.0", "1.0.0-rc1"));
/// assert!(!is_greater("main", "1.0.0"));
/// assert!(!is_greater("1.0.0", "main"));
/// ```
#[must_use]
pub fn is_greater(candidate: &str, baseline: &str) -> bool {
    match (parse_loose(candidate), parse_loose(baseline)) {
        (Some(c), Some(b)) => c > b,
        _ => false,
    }
}

/// Folds the list with [`is_greater`], starting from [`VERSION_FLOOR`].
///
/// An empty or entirely unparsable list yields the floor itself. Of two tags
/// with equal precedence the earlier one wins.
#[must_use]
pub fn greatest_of<'a, I>(tags: I) -> VersionTag
where
    I: IntoIterator<Item = &'a VersionTag>,
{
    let mut greatest = VersionTag::new(VERSION_FLOOR);
    for tag in tags {
        if tag.is_greater_than(&greatest) {
            greatest = tag.clone();
        }
    }
    greatest
}

/// Compares the leading numeric component of two tags.
///
/// `v1.9.0` to `2.0.0` is a major upgrade; `1.2.0` to `1.9.0` is not. Tags
/// without a numeric leading component are never a major upgrade.
#[must_use]
pub fn is_major_upgrade(current: &str, candidate: &str) -> bool {
    match (leading_component(current), leading_component(candidate)) {
        (Some(from), Some(to)) => to > from,
        _ => false,
    }
}

fn leading_component(tag: &str) -> Option<u64> {
    strip_v(tag.trim()).split(['.', '-', '+']).next()?.parse().ok()
}

fn strip_v(s: &str) -> &str {
    s.strip_prefix('v').or_else(|| s.strip_prefix('V')).unwrap_or(s)
}

/// Parses `1`, `1.2`, `1.2.3`, each optionally prefixed with `v` and followed
/// by `-prerelease` and/or `+build`.
fn parse_loose(raw: &str) -> Option<Version> {
    let s = strip_v(raw.trim());
    if s.is_empty() {
        return None;
    }

    let (rest, _build) = match s.split_once('+') {
        Some((head, build)) => (head, Some(build)),
        None => (s, None),
    };
    let (core, pre) = match rest.split_once('-') {
        Some((head, pre)) => (head, Some(pre)),
        None => (rest, None),
    };

    let mut parts = [0u64; 3];
    let mut count = 0;
    for piece in core.split('.') {
        if count == parts.len() || piece.is_empty() || !piece.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        parts[count] = piece.parse().ok()?;
        count += 1;
    }

    let pre = match pre {
        Some(p) => Prerelease::new(p).ok()?,
        None => Prerelease::EMPTY,
    };

    Some(Version {
        major: parts[0],
        minor: parts[1],
        patch: parts[2],
        pre,
        build: BuildMetadata::EMPTY,
    })
}
