//! Repository URL parsing.

use super::RepoRef;
use crate::core::GhPushError;

const HOST_MARKER: &str = "github.com";

/// Parse a GitHub repository URL into owner and repository name.
///
/// Accepts `https://github.com/{owner}/{repo}` with an optional `.git`
/// suffix, trailing slash or extra path segments, and the SSH form
/// `git@github.com:{owner}/{repo}.git`.
///
/// # Errors
///
/// [`GhPushError::InvalidUrl`] when the `github.com` host is absent or the
/// owner or repository part is empty.
pub fn parse_repository_url(url: &str) -> Result<RepoRef, GhPushError> {
    let invalid = || GhPushError::InvalidUrl {
        url: url.to_string(),
    };

    let trimmed = url.trim();
    let start = trimmed.find(HOST_MARKER).ok_or_else(invalid)?;
    let rest = &trimmed[start + HOST_MARKER.len()..];
    let rest = rest.strip_prefix([':', '/']).ok_or_else(invalid)?;
    let rest = rest.split(['?', '#']).next().unwrap_or_default();

    let mut parts = rest.split('/').filter(|part| !part.is_empty());
    let owner = parts.next().ok_or_else(invalid)?;
    let repo = parts.next().ok_or_else(invalid)?;
    let repo = repo.strip_suffix(".git").unwrap_or(repo);

    if owner.is_empty() || repo.is_empty() {
        return Err(invalid());
    }

    Ok(RepoRef::new(owner, repo))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_forms() {
        let expected = RepoRef::new("acme", "shop-tools");
        for url in [
            "https://github.com/acme/shop-tools",
            "https://github.com/acme/shop-tools.git",
            "https://github.com/acme/shop-tools/",
            "https://github.com/acme/shop-tools/tree/main/src",
            "http://www.github.com/acme/shop-tools?tab=readme",
            "  https://github.com/acme/shop-tools  ",
        ] {
            assert_eq!(parse_repository_url(url).unwrap(), expected, "{url}");
        }
    }

    #[test]
    fn test_ssh_form() {
        let parsed = parse_repository_url("git@github.com:acme/theme.git").unwrap();
        assert_eq!(parsed, RepoRef::new("acme", "theme"));
    }

    #[test]
    fn test_rejects_other_hosts_and_missing_parts() {
        for url in [
            "https://gitlab.com/acme/shop",
            "https://github.com/acme",
            "https://github.com/",
            "https://github.com/acme/.git",
            "github.com",
            "",
        ] {
            let err = parse_repository_url(url).unwrap_err();
            assert!(matches!(err, GhPushError::InvalidUrl { .. }), "{url}");
        }
    }
}
