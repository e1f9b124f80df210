//! Version file discovery and reference resolution.
//!
//! Repositories lay their code out in many ways: the plugin may sit at the
//! root, inside a directory named after the slug, or under `src/`. The
//! [`VersionLocator`] runs an ordered list of [`LocateStrategy`] values
//! against the GitHub contents API and stops at the first hit:
//!
//! 1. [`LocateStrategy::ExactRootMatch`] - hinted filename in the root
//! 2. [`LocateStrategy::ExactSubdirMatch`] - hinted filename one level down
//! 3. [`LocateStrategy::HeaderScan`] - first `.php`/`style.css` with a
//!    `Version:` header, root first, then one level down
//! 4. [`LocateStrategy::ConventionalPaths`] - direct probes of common paths
//!
//! Directory listings and decoded file contents are cached on the locator,
//! so reading the located file afterwards costs no extra request.
//!
//! When nothing matches, [`GhPushError::VersionFileNotFound`] carries the
//! probed paths and the root listing so the operator can see what was there.

use std::collections::HashMap;
use tracing::{debug, info};

use super::url::parse_repository_url;
use super::{BranchCommit, ContentEntry, GitHubApi, RepoInfo, RepoRef};
use crate::config::TagOrder;
use crate::core::{ComponentKind, GhPushError};
use crate::version::{extract_version, has_version_header, read_header_field, sort_tags_descending};

/// Directories probed by [`LocateStrategy::ConventionalPaths`].
const CONVENTIONAL_DIRS: [&str; 4] = ["src", "includes", "lib", "app"];

/// Where the version file is expected, derived from the install slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionFileHint {
    /// Expected path from the repository root
    pub slug_path: String,
    /// Expected file name
    pub filename: String,
}

impl VersionFileHint {
    /// Plugin: the install slug and its basename. Theme: `<slug>/style.css`.
    #[must_use]
    pub fn for_component(kind: ComponentKind, install_slug: &str) -> Self {
        let slug = install_slug.trim_matches('/');
        match kind {
            ComponentKind::Plugin => Self {
                slug_path: slug.to_string(),
                filename: slug.rsplit('/').next().unwrap_or(slug).to_string(),
            },
            ComponentKind::Theme => Self {
                slug_path: format!("{slug}/style.css"),
                filename: "style.css".to_string(),
            },
        }
    }

    /// Candidate paths for the conventional-path probe, without duplicates.
    #[must_use]
    pub fn conventional_paths(&self) -> Vec<String> {
        let name = self.filename.as_str();
        let dir = self.slug_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or_default();

        let mut candidates = vec![self.slug_path.clone(), name.to_string()];
        if !dir.is_empty() {
            candidates.push(format!("{dir}/{name}"));
        }
        for base in CONVENTIONAL_DIRS {
            candidates.push(format!("{base}/{name}"));
            if !dir.is_empty() {
                candidates.push(format!("{base}/{dir}/{name}"));
            }
        }

        let mut unique = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !candidate.is_empty() && !unique.contains(&candidate) {
                unique.push(candidate);
            }
        }
        unique
    }
}

/// One way of finding the version file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateStrategy {
    /// Root entry whose name equals the hinted filename
    ExactRootMatch,
    /// Entry with the hinted filename inside a root directory
    ExactSubdirMatch,
    /// First PHP file or stylesheet carrying a `Version:` header
    HeaderScan,
    /// Direct fetches of the slug path and common source directories
    ConventionalPaths,
}

impl LocateStrategy {
    /// Every strategy, in search order.
    pub const ALL: [Self; 4] =
        [Self::ExactRootMatch, Self::ExactSubdirMatch, Self::HeaderScan, Self::ConventionalPaths];

    /// Strategies that only inspect the listed tree. Used for validation.
    pub const TREE_SEARCH: [Self; 3] = [Self::ExactRootMatch, Self::ExactSubdirMatch, Self::HeaderScan];

    const fn needs_root_listing(self) -> bool {
        !matches!(self, Self::ConventionalPaths)
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ExactRootMatch => "exact root match",
            Self::ExactSubdirMatch => "exact subdirectory match",
            Self::HeaderScan => "header scan",
            Self::ConventionalPaths => "conventional paths",
        }
    }
}

fn is_header_candidate(entry: &ContentEntry) -> bool {
    entry.is_file()
        && (entry.name.to_ascii_lowercase().ends_with(".php")
            || entry.name.eq_ignore_ascii_case("style.css"))
}

/// Errors that make a probe move on instead of aborting the search.
fn is_skippable(error: &GhPushError) -> bool {
    error.is_not_found_response() || matches!(error, GhPushError::DecodeError { .. })
}

/// Searches one repository at one reference for its version file.
pub struct VersionLocator<'a> {
    api: &'a dyn GitHubApi,
    repo: &'a RepoRef,
    reference: &'a str,
    token: Option<&'a str>,
    root: Option<Result<Vec<ContentEntry>, GhPushError>>,
    listings: HashMap<String, Option<Vec<ContentEntry>>>,
    contents: HashMap<String, String>,
    tried_paths: Vec<String>,
}

impl<'a> VersionLocator<'a> {
    /// Locator for `repo` at branch or tag `reference`.
    pub fn new(
        api: &'a dyn GitHubApi,
        repo: &'a RepoRef,
        reference: &'a str,
        token: Option<&'a str>,
    ) -> Self {
        Self {
            api,
            repo,
            reference,
            token,
            root: None,
            listings: HashMap::new(),
            contents: HashMap::new(),
            tried_paths: Vec::new(),
        }
    }

    /// Root listing, fetched once.
    pub async fn root_listing(&mut self) -> Result<Vec<ContentEntry>, GhPushError> {
        let result = match self.root.take() {
            Some(result) => result,
            None => self.api.list_directory(self.repo, "", self.reference, self.token).await,
        };
        self.root = Some(result.clone());
        result
    }

    async fn subdir_listing(&mut self, path: &str) -> Option<Vec<ContentEntry>> {
        if let Some(cached) = self.listings.get(path) {
            return cached.clone();
        }
        let listing =
            match self.api.list_directory(self.repo, path, self.reference, self.token).await {
                Ok(entries) => Some(entries),
                Err(e) => {
                    debug!("Skipping directory {path} in {}: {e}", self.repo);
                    None
                }
            };
        self.listings.insert(path.to_string(), listing.clone());
        listing
    }

    /// Fetch and decode a file, served from cache on repeat calls.
    pub async fn read_file(&mut self, path: &str) -> Result<String, GhPushError> {
        if let Some(contents) = self.contents.get(path) {
            return Ok(contents.clone());
        }
        let file = self.api.file_content(self.repo, path, self.reference, self.token).await?;
        let contents = file.decode()?;
        self.contents.insert(path.to_string(), contents.clone());
        Ok(contents)
    }

    /// Run every strategy in order.
    pub async fn locate(&mut self, hint: &VersionFileHint) -> Result<String, GhPushError> {
        self.locate_with(hint, &LocateStrategy::ALL).await
    }

    /// Run the given strategies in order and return the first path found.
    ///
    /// Strategies that need the root listing are skipped when it cannot be
    /// fetched.
    pub async fn locate_with(
        &mut self,
        hint: &VersionFileHint,
        strategies: &[LocateStrategy],
    ) -> Result<String, GhPushError> {
        let root = self.root_listing().await;
        let entries = root.as_deref().unwrap_or(&[]);

        for strategy in strategies {
            if strategy.needs_root_listing() && root.is_err() {
                continue;
            }
            let found = match strategy {
                LocateStrategy::ExactRootMatch => exact_root_match(entries, hint),
                LocateStrategy::ExactSubdirMatch => self.exact_subdir_match(entries, hint).await,
                LocateStrategy::HeaderScan => self.header_scan(entries).await?,
                LocateStrategy::ConventionalPaths => self.conventional_paths(hint).await?,
            };
            if let Some(path) = found {
                info!("Located version file {path} in {} via {}", self.repo, strategy.name());
                return Ok(path);
            }
        }

        Err(GhPushError::VersionFileNotFound {
            filename: hint.filename.clone(),
            tried_paths: self.tried_paths.clone(),
            root_listing: entries
                .iter()
                .map(|entry| format!("{} ({})", entry.name, entry.entry_type))
                .collect(),
            root_error: root.as_ref().err().map(ToString::to_string),
            owner: self.repo.owner.clone(),
            repo: self.repo.repo.clone(),
            reference: self.reference.to_string(),
        })
    }

    async fn exact_subdir_match(
        &mut self,
        root: &[ContentEntry],
        hint: &VersionFileHint,
    ) -> Option<String> {
        for dir in root.iter().filter(|entry| entry.is_dir()) {
            let Some(listing) = self.subdir_listing(&dir.path).await else {
                continue;
            };
            if let Some(entry) =
                listing.iter().find(|entry| entry.is_file() && entry.name == hint.filename)
            {
                return Some(entry.path.clone());
            }
        }
        None
    }

    async fn header_scan(&mut self, root: &[ContentEntry]) -> Result<Option<String>, GhPushError> {
        let root_candidates: Vec<String> =
            root.iter().filter(|e| is_header_candidate(e)).map(|e| e.path.clone()).collect();
        if let Some(path) = self.first_with_header(root_candidates).await? {
            return Ok(Some(path));
        }

        for dir in root.iter().filter(|entry| entry.is_dir()) {
            let Some(listing) = self.subdir_listing(&dir.path).await else {
                continue;
            };
            let candidates: Vec<String> =
                listing.iter().filter(|e| is_header_candidate(e)).map(|e| e.path.clone()).collect();
            if let Some(path) = self.first_with_header(candidates).await? {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    async fn first_with_header(
        &mut self,
        candidates: Vec<String>,
    ) -> Result<Option<String>, GhPushError> {
        for path in candidates {
            match self.read_file(&path).await {
                Ok(contents) if has_version_header(&contents) => return Ok(Some(path)),
                Ok(_) => {}
                Err(e) if is_skippable(&e) => debug!("Header scan skipped {path}: {e}"),
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    async fn conventional_paths(
        &mut self,
        hint: &VersionFileHint,
    ) -> Result<Option<String>, GhPushError> {
        for path in hint.conventional_paths() {
            self.tried_paths.push(path.clone());
            match self.read_file(&path).await {
                Ok(_) => return Ok(Some(path)),
                Err(e) if is_skippable(&e) => debug!("Probe {path} missed: {e}"),
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

fn exact_root_match(root: &[ContentEntry], hint: &VersionFileHint) -> Option<String> {
    root.iter()
        .find(|entry| entry.is_file() && entry.name == hint.filename)
        .map(|entry| entry.path.clone())
}

/// Most recent tag name.
///
/// With [`TagOrder::Api`] this is the first tag GitHub returns. With
/// [`TagOrder::Semver`] the list is sorted highest first before picking.
///
/// # Errors
///
/// [`GhPushError::NoTags`] on an empty list or a 404; other API errors pass
/// through.
pub async fn resolve_latest_tag(
    api: &dyn GitHubApi,
    repo: &RepoRef,
    token: Option<&str>,
    order: TagOrder,
) -> Result<String, GhPushError> {
    let no_tags = || GhPushError::NoTags {
        owner: repo.owner.clone(),
        repo: repo.repo.clone(),
    };

    let mut tags = match api.tags(repo, token).await {
        Ok(tags) => tags,
        Err(e) if e.is_not_found_response() => return Err(no_tags()),
        Err(e) => return Err(e),
    };

    if order == TagOrder::Semver {
        sort_tags_descending(&mut tags);
    }

    tags.into_iter().next().map(|tag| tag.name).ok_or_else(no_tags)
}

/// Head commit of a branch.
pub async fn resolve_branch_head_commit(
    api: &dyn GitHubApi,
    repo: &RepoRef,
    branch: &str,
    token: Option<&str>,
) -> Result<BranchCommit, GhPushError> {
    api.branch_commit(repo, branch, token).await
}

/// Repository metadata for a URL. 404 becomes [`GhPushError::RepositoryNotFound`].
pub async fn get_repo_info(
    api: &dyn GitHubApi,
    url: &str,
    token: Option<&str>,
) -> Result<RepoInfo, GhPushError> {
    let repo = parse_repository_url(url)?;
    fetch_repository(api, &repo, token).await
}

async fn fetch_repository(
    api: &dyn GitHubApi,
    repo: &RepoRef,
    token: Option<&str>,
) -> Result<RepoInfo, GhPushError> {
    match api.repository(repo, token).await {
        Err(e) if e.is_not_found_response() => Err(GhPushError::RepositoryNotFound {
            owner: repo.owner.clone(),
            repo: repo.repo.clone(),
        }),
        other => other,
    }
}

/// What [`validate_repository`] found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Parsed repository
    pub repository: RepoRef,
    /// Path of the version file
    pub path: String,
    /// `Plugin Name` or `Theme Name` header value
    pub name: String,
    /// Declared version
    pub version: String,
}

/// Check that a repository can serve as the update source for a component.
///
/// The repository must exist, its root must be listable at `branch`, the
/// version file must be found in the listed tree, and that file must declare
/// a name header and a version.
pub async fn validate_repository(
    api: &dyn GitHubApi,
    url: &str,
    install_slug: &str,
    kind: ComponentKind,
    branch: &str,
    token: Option<&str>,
) -> Result<ValidationReport, GhPushError> {
    let repository = parse_repository_url(url)?;
    fetch_repository(api, &repository, token).await?;

    let mut locator = VersionLocator::new(api, &repository, branch, token);
    locator.root_listing().await?;

    let hint = VersionFileHint::for_component(kind, install_slug);
    let path = locator.locate_with(&hint, &LocateStrategy::TREE_SEARCH).await?;
    let contents = locator.read_file(&path).await?;

    let name_field = match kind {
        ComponentKind::Plugin => "Plugin Name",
        ComponentKind::Theme => "Theme Name",
    };
    let name = read_header_field(&contents, name_field).ok_or_else(|| {
        GhPushError::InvalidInput {
            message: format!("{path} does not declare a '{name_field}' header"),
        }
    })?;

    let version = extract_version(&contents);
    if version.is_empty() {
        return Err(GhPushError::VersionNotDeclared {
            path,
        });
    }

    Ok(ValidationReport {
        repository: repository.clone(),
        path,
        name,
        version,
    })
}
