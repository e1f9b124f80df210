//! reqwest-backed GitHub REST client.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{BranchCommit, ContentEntry, FileContent, GitHubApi, RepoInfo, RepoRef, Tag};
use crate::config::GlobalConfig;
use crate::core::GhPushError;

const ACCEPT_V3: &str = "application/vnd.github.v3+json";
const TAGS_PER_PAGE: &str = "100";

#[derive(Deserialize)]
struct ApiMessage {
    message: Option<String>,
}

#[derive(Deserialize)]
struct RawOwner {
    login: String,
}

#[derive(Deserialize)]
struct RawRepository {
    name: String,
    full_name: String,
    description: Option<String>,
    owner: RawOwner,
}

/// GitHub REST API client.
///
/// API calls and archive downloads use separate reqwest clients so they can
/// carry different timeouts.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    api: reqwest::Client,
    downloads: reqwest::Client,
    api_base: String,
}

impl GitHubClient {
    /// Build a client from the configured base URL and timeouts.
    pub fn new(config: &GlobalConfig) -> Result<Self, GhPushError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_V3));
        let agent = format!("github-push/{}", env!("CARGO_PKG_VERSION"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&agent).map_err(|e| GhPushError::ConfigError {
                message: e.to_string(),
            })?,
        );

        let build = |timeout| {
            reqwest::Client::builder()
                .default_headers(headers.clone())
                .timeout(timeout)
                .build()
                .map_err(|e| GhPushError::ConfigError {
                    message: format!("Failed to build HTTP client: {e}"),
                })
        };

        Ok(Self {
            api: build(config.api_timeout())?,
            downloads: build(config.download_timeout())?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn authorize(request: reqwest::RequestBuilder, token: Option<&str>) -> reqwest::RequestBuilder {
        match token {
            Some(token) => request.header(AUTHORIZATION, format!("token {token}")),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        token: Option<&str>,
    ) -> Result<T, GhPushError> {
        let url = format!("{}{}", self.api_base, path);
        debug!("GET {url}");

        let request = Self::authorize(self.api.get(&url).query(query), token);
        let response = request.send().await.map_err(|e| GhPushError::ApiError {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        response.json::<T>().await.map_err(|e| GhPushError::DecodeError {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Turn a non-200 response into [`GhPushError::ApiError`], preferring the
/// JSON `message` field over the status reason.
fn api_error(status: StatusCode, body: &str) -> GhPushError {
    let message = serde_json::from_str::<ApiMessage>(body)
        .ok()
        .and_then(|m| m.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());
    GhPushError::ApiError {
        status: Some(status.as_u16()),
        message,
    }
}

fn contents_path(repo: &RepoRef, path: &str) -> String {
    let path = path.trim_matches('/');
    if path.is_empty() {
        format!("/repos/{}/{}/contents", repo.owner, repo.repo)
    } else {
        format!("/repos/{}/{}/contents/{}", repo.owner, repo.repo, path)
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn repository(
        &self,
        repo: &RepoRef,
        token: Option<&str>,
    ) -> Result<RepoInfo, GhPushError> {
        let raw: RawRepository =
            self.get_json(&format!("/repos/{}/{}", repo.owner, repo.repo), &[], token).await?;
        Ok(RepoInfo {
            name: raw.name,
            full_name: raw.full_name,
            description: raw.description,
            owner: raw.owner.login,
            repo: repo.repo.clone(),
        })
    }

    async fn tags(&self, repo: &RepoRef, token: Option<&str>) -> Result<Vec<Tag>, GhPushError> {
        self.get_json(
            &format!("/repos/{}/{}/tags", repo.owner, repo.repo),
            &[("per_page", TAGS_PER_PAGE)],
            token,
        )
        .await
    }

    async fn branch_commit(
        &self,
        repo: &RepoRef,
        branch: &str,
        token: Option<&str>,
    ) -> Result<BranchCommit, GhPushError> {
        self.get_json(&format!("/repos/{}/{}/commits/{branch}", repo.owner, repo.repo), &[], token)
            .await
    }

    async fn list_directory(
        &self,
        repo: &RepoRef,
        path: &str,
        reference: &str,
        token: Option<&str>,
    ) -> Result<Vec<ContentEntry>, GhPushError> {
        self.get_json(&contents_path(repo, path), &[("ref", reference)], token).await
    }

    async fn file_content(
        &self,
        repo: &RepoRef,
        path: &str,
        reference: &str,
        token: Option<&str>,
    ) -> Result<FileContent, GhPushError> {
        self.get_json(&contents_path(repo, path), &[("ref", reference)], token).await
    }

    async fn download_archive(
        &self,
        url: &str,
        token: Option<&str>,
        dest: &Path,
    ) -> Result<(), GhPushError> {
        debug!("Downloading {url} to {}", dest.display());
        let failed = |reason: String| GhPushError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        let request = Self::authorize(self.downloads.get(url), token);
        let response = request.send().await.map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(failed(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            )));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| failed(e.to_string()))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(())
    }
}
