//! GitHub access.
//!
//! All network traffic goes through the [`GitHubApi`] trait so the resolver,
//! locator and archive fetcher can be driven by an in-memory fake in tests.
//! [`GitHubClient`] is the reqwest-backed implementation.
//!
//! - [`url`] - repository URL parsing
//! - [`client`] - REST client
//! - [`locator`] - version file discovery, tag and branch resolution

pub mod client;
pub mod locator;
pub mod url;

pub use client::GitHubClient;
pub use locator::{
    LocateStrategy, ValidationReport, VersionFileHint, VersionLocator, get_repo_info,
    resolve_branch_head_commit, resolve_latest_tag, validate_repository,
};
pub use url::parse_repository_url;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::core::GhPushError;

/// Owner and name of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    /// Account or organization
    pub owner: String,
    /// Repository name without `.git`
    pub repo: String,
}

impl RepoRef {
    /// Build a reference from its parts.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Repository metadata returned by `GET /repos/{owner}/{repo}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    /// Repository name
    pub name: String,
    /// `owner/name`
    pub full_name: String,
    /// Free-form description, if set
    pub description: Option<String>,
    /// Owner login
    pub owner: String,
    /// Repository name as parsed from the URL
    pub repo: String,
}

/// A tag as listed by `GET /repos/{owner}/{repo}/tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name, e.g. `v1.2.0`
    pub name: String,
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

/// Head commit of a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchCommit {
    /// Full commit SHA
    pub sha: String,
}

/// Type of an entry in a contents listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Regular file
    File,
    /// Directory
    Dir,
    /// Symlink, submodule or anything else
    #[serde(other)]
    Other,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::File => "file",
            Self::Dir => "dir",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// One entry of `GET /repos/{owner}/{repo}/contents/{path}` for a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    /// File or directory name
    pub name: String,
    /// Path from the repository root
    pub path: String,
    /// Entry type
    #[serde(rename = "type")]
    pub entry_type: EntryType,
}

impl ContentEntry {
    /// True for regular files.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }

    /// True for directories.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Dir
    }
}

/// A single file returned by the contents endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    /// Path from the repository root
    pub path: String,
    /// Base64 payload. GitHub wraps it at 60 columns.
    #[serde(default)]
    pub content: Option<String>,
}

impl FileContent {
    /// Decode the base64 payload into text.
    ///
    /// Invalid UTF-8 sequences are replaced; headers are ASCII so this never
    /// hides a version.
    pub fn decode(&self) -> Result<String, GhPushError> {
        let encoded = self.content.as_deref().ok_or_else(|| GhPushError::DecodeError {
            path: self.path.clone(),
            reason: "response has no content field".to_string(),
        })?;
        let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD.decode(compact).map_err(|e| {
            GhPushError::DecodeError {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Encode text the way the contents endpoint does. Used by fakes.
    #[must_use]
    pub fn encode(path: &str, text: &str) -> Self {
        Self {
            path: path.to_string(),
            content: Some(base64::engine::general_purpose::STANDARD.encode(text)),
        }
    }
}

/// Operations github-push needs from GitHub.
///
/// Every call takes the registration's optional access token. A non-200
/// response is reported as [`GhPushError::ApiError`] carrying the status.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Repository metadata.
    async fn repository(&self, repo: &RepoRef, token: Option<&str>)
    -> Result<RepoInfo, GhPushError>;

    /// Tags in the order the API returns them.
    async fn tags(&self, repo: &RepoRef, token: Option<&str>) -> Result<Vec<Tag>, GhPushError>;

    /// Head commit of `branch`.
    async fn branch_commit(
        &self,
        repo: &RepoRef,
        branch: &str,
        token: Option<&str>,
    ) -> Result<BranchCommit, GhPushError>;

    /// Entries of a directory at `reference`. An empty `path` lists the root.
    async fn list_directory(
        &self,
        repo: &RepoRef,
        path: &str,
        reference: &str,
        token: Option<&str>,
    ) -> Result<Vec<ContentEntry>, GhPushError>;

    /// A single file at `reference`.
    async fn file_content(
        &self,
        repo: &RepoRef,
        path: &str,
        reference: &str,
        token: Option<&str>,
    ) -> Result<FileContent, GhPushError>;

    /// Stream the archive at `url` into `dest`.
    async fn download_archive(
        &self,
        url: &str,
        token: Option<&str>,
        dest: &Path,
    ) -> Result<(), GhPushError>;
}
