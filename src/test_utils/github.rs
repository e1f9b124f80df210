//! In-memory [`GitHubApi`] implementation.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

use crate::core::GhPushError;
use crate::github::{
    BranchCommit, ContentEntry, EntryType, FileContent, GitHubApi, RepoInfo, RepoRef, Tag,
};

#[derive(Debug, Clone)]
enum FakeFile {
    Text(String),
    Undecodable,
}

#[derive(Debug, Default)]
struct FakeRepo {
    tags: Vec<String>,
    branches: BTreeMap<String, String>,
    /// `(reference, path)` to file
    files: BTreeMap<(String, String), FakeFile>,
}

#[derive(Debug, Clone)]
enum FakeArchive {
    Bytes(Vec<u8>),
    /// Reports success but leaves no file behind
    Vanishes,
}

/// GitHub stand-in for tests.
///
/// Repositories spring into existence when a file or tag is added. Every
/// call is recorded as a request key:
///
/// | call             | key                          |
/// |------------------|------------------------------|
/// | repository       | `repository o/r`             |
/// | tags             | `tags o/r`                   |
/// | branch commit    | `commit o/r branch`          |
/// | directory        | `list o/r ref /path`         |
/// | file             | `file o/r ref path`          |
/// | archive download | `download url`               |
///
/// [`FakeGitHub::fail_requests`] makes every request whose key starts with
/// a prefix fail with a given error.
#[derive(Debug, Default)]
pub struct FakeGitHub {
    repos: Mutex<BTreeMap<String, FakeRepo>>,
    archives: Mutex<HashMap<String, FakeArchive>>,
    failures: Mutex<Vec<(String, GhPushError)>>,
    requests: Mutex<Vec<String>>,
}

fn not_found() -> GhPushError {
    GhPushError::ApiError {
        status: Some(404),
        message: "Not Found".to_string(),
    }
}

fn fake_sha(owner: &str, repo: &str, branch: &str) -> String {
    hex::encode(Sha256::digest(format!("{owner}/{repo}@{branch}").as_bytes()))[..40].to_string()
}

impl FakeGitHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_repo<T>(&self, owner: &str, repo: &str, f: impl FnOnce(&mut FakeRepo) -> T) -> T {
        let mut repos = self.repos.lock().unwrap();
        f(repos.entry(format!("{owner}/{repo}")).or_default())
    }

    /// Create an empty repository.
    pub fn add_repo(&self, owner: &str, repo: &str) {
        self.with_repo(owner, repo, |_| ());
    }

    /// Add a file at `reference`; the branch gets a head commit.
    pub fn add_file(&self, owner: &str, repo: &str, reference: &str, path: &str, contents: &str) {
        self.insert_file(owner, repo, reference, path, FakeFile::Text(contents.to_string()));
    }

    /// Add a file whose content field is not valid base64.
    pub fn add_undecodable_file(&self, owner: &str, repo: &str, reference: &str, path: &str) {
        self.insert_file(owner, repo, reference, path, FakeFile::Undecodable);
    }

    fn insert_file(&self, owner: &str, repo: &str, reference: &str, path: &str, file: FakeFile) {
        let sha = fake_sha(owner, repo, reference);
        self.with_repo(owner, repo, |r| {
            r.branches.insert(reference.to_string(), sha);
            r.files.insert((reference.to_string(), path.trim_matches('/').to_string()), file);
        });
    }

    /// Replace the tag list, in API order.
    pub fn set_tags(&self, owner: &str, repo: &str, tags: &[&str]) {
        self.with_repo(owner, repo, |r| {
            r.tags = tags.iter().map(|t| (*t).to_string()).collect();
        });
    }

    /// Serve `bytes` for downloads of `url`.
    pub fn set_archive(&self, url: &str, bytes: Vec<u8>) {
        self.archives.lock().unwrap().insert(url.to_string(), FakeArchive::Bytes(bytes));
    }

    /// Downloads of `url` succeed but leave no file.
    pub fn set_archive_vanishes(&self, url: &str) {
        self.archives.lock().unwrap().insert(url.to_string(), FakeArchive::Vanishes);
    }

    /// Fail every request whose key starts with `prefix`.
    pub fn fail_requests(&self, prefix: &str, error: GhPushError) {
        self.failures.lock().unwrap().push((prefix.to_string(), error));
    }

    /// Request keys in call order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, key: String) -> Result<(), GhPushError> {
        let failure = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| key.starts_with(prefix.as_str()))
            .map(|(_, error)| error.clone());
        self.requests.lock().unwrap().push(key);
        failure.map_or(Ok(()), Err)
    }

    fn read_repo<T>(
        &self,
        repo: &RepoRef,
        f: impl FnOnce(&FakeRepo) -> Result<T, GhPushError>,
    ) -> Result<T, GhPushError> {
        let repos = self.repos.lock().unwrap();
        repos.get(&repo.to_string()).map_or_else(|| Err(not_found()), f)
    }
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn repository(&self, repo: &RepoRef, _token: Option<&str>) -> Result<RepoInfo, GhPushError> {
        self.record(format!("repository {repo}"))?;
        self.read_repo(repo, |_| {
            Ok(RepoInfo {
                name: repo.repo.clone(),
                full_name: repo.to_string(),
                description: None,
                owner: repo.owner.clone(),
                repo: repo.repo.clone(),
            })
        })
    }

    async fn tags(&self, repo: &RepoRef, _token: Option<&str>) -> Result<Vec<Tag>, GhPushError> {
        self.record(format!("tags {repo}"))?;
        self.read_repo(repo, |r| {
            Ok(r.tags
                .iter()
                .map(|name| Tag {
                    name: name.clone(),
                })
                .collect())
        })
    }

    async fn branch_commit(
        &self,
        repo: &RepoRef,
        branch: &str,
        _token: Option<&str>,
    ) -> Result<BranchCommit, GhPushError> {
        self.record(format!("commit {repo} {branch}"))?;
        self.read_repo(repo, |r| {
            r.branches
                .get(branch)
                .map(|sha| BranchCommit {
                    sha: sha.clone(),
                })
                .ok_or_else(not_found)
        })
    }

    async fn list_directory(
        &self,
        repo: &RepoRef,
        path: &str,
        reference: &str,
        _token: Option<&str>,
    ) -> Result<Vec<ContentEntry>, GhPushError> {
        let dir = path.trim_matches('/');
        self.record(format!("list {repo} {reference} /{dir}"))?;
        self.read_repo(repo, |r| {
            let prefix = if dir.is_empty() { String::new() } else { format!("{dir}/") };
            let mut entries: Vec<ContentEntry> = Vec::new();
            for (file_ref, file_path) in r.files.keys() {
                if file_ref != reference {
                    continue;
                }
                let Some(rest) = file_path.strip_prefix(&prefix) else {
                    continue;
                };
                let (name, entry_type) = match rest.split_once('/') {
                    Some((first, _)) => (first, EntryType::Dir),
                    None => (rest, EntryType::File),
                };
                if entries.iter().any(|e| e.name == name) {
                    continue;
                }
                entries.push(ContentEntry {
                    name: name.to_string(),
                    path: format!("{prefix}{name}"),
                    entry_type,
                });
            }
            if entries.is_empty() { Err(not_found()) } else { Ok(entries) }
        })
    }

    async fn file_content(
        &self,
        repo: &RepoRef,
        path: &str,
        reference: &str,
        _token: Option<&str>,
    ) -> Result<FileContent, GhPushError> {
        let path = path.trim_matches('/');
        self.record(format!("file {repo} {reference} {path}"))?;
        self.read_repo(repo, |r| {
            match r.files.get(&(reference.to_string(), path.to_string())) {
                Some(FakeFile::Text(text)) => Ok(FileContent::encode(path, text)),
                Some(FakeFile::Undecodable) => Ok(FileContent {
                    path: path.to_string(),
                    content: Some("%%% not base64 %%%".to_string()),
                }),
                None => Err(not_found()),
            }
        })
    }

    async fn download_archive(
        &self,
        url: &str,
        _token: Option<&str>,
        dest: &Path,
    ) -> Result<(), GhPushError> {
        self.record(format!("download {url}"))?;
        let archive = self.archives.lock().unwrap().get(url).cloned();
        match archive {
            Some(FakeArchive::Bytes(bytes)) => Ok(std::fs::write(dest, bytes)?),
            Some(FakeArchive::Vanishes) => {
                let _ = std::fs::remove_file(dest);
                Ok(())
            }
            None => Err(GhPushError::DownloadFailed {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            }),
        }
    }
}
