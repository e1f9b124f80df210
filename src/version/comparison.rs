//! Dotted version comparison and tag ordering.
//!
//! WordPress version strings are loosely formatted (`2.10`, `1.0.0-1`,
//! `v3.1`), so comparison is done segment by segment instead of through
//! strict semver parsing. Semver is only used to order tag lists when the
//! `semver` tag order is configured.
//!
//! # Examples
//!
//! ```rust,no_run
//! use github_push::version::comparison::{compare_versions, is_newer};
//! use std::cmp::Ordering;
//!
//! assert_eq!(compare_versions("2.10", "2.9"), Ordering::Greater);
//! assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
//! assert!(!is_newer("1.2.0", "1.2.0"));
//! ```

use semver::Version;
use std::cmp::{Ordering, Reverse};

/// Strip a single leading `v` or `V` from a tag or version string.
#[must_use]
pub fn normalize_tag(tag: &str) -> &str {
    let trimmed = tag.trim();
    trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed)
}

/// Numeric value of each `.`/`-` separated segment.
///
/// A segment's value is its leading run of digits; segments without one
/// count as zero.
fn segments(version: &str) -> Vec<u64> {
    normalize_tag(version)
        .split(['.', '-'])
        .map(|segment| {
            let digits: String = segment.chars().take_while(char::is_ascii_digit).collect();
            match digits.parse::<u64>() {
                Ok(n) => n,
                Err(_) if digits.is_empty() => 0,
                // Too many digits for u64
                Err(_) => u64::MAX,
            }
        })
        .collect()
}

/// Compare two version strings segment-wise, padding the shorter with zeros.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = segments(a);
    let right = segments(b);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// True when `latest` is strictly greater than `current`.
#[must_use]
pub fn is_newer(latest: &str, current: &str) -> bool {
    compare_versions(latest, current) == Ordering::Greater
}

/// Sort key for a tag under the `semver` tag order.
///
/// Tags that parse as semver (after dropping the `v` prefix) keep their
/// prerelease ordering. Anything else is mapped onto `major.minor.patch`
/// from its first three dotted segments so every tag gets a key.
fn tag_sort_key(tag: &str) -> Version {
    let normalized = normalize_tag(tag);
    if let Ok(version) = Version::parse(normalized) {
        return version;
    }
    let parts = segments(normalized);
    Version::new(
        parts.first().copied().unwrap_or(0),
        parts.get(1).copied().unwrap_or(0),
        parts.get(2).copied().unwrap_or(0),
    )
}

/// Sort tags highest first. Equal keys keep their API order.
pub fn sort_tags_descending<T: AsRef<str>>(tags: &mut [T]) {
    tags.sort_by_cached_key(|tag| Reverse(tag_sort_key(tag.as_ref())));
}
