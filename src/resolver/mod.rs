//! Update resolution.
//!
//! Given a [`Registration`], the [`UpdateResolver`] decides whether a newer
//! version is available on GitHub and where to download it from.
//!
//! # Tag mode
//!
//! The latest tag is resolved (see [`resolve_latest_tag`]), its leading `v`
//! is dropped, and it is compared with the installed version. API failures
//! are returned to the caller.
//!
//! # Branch mode
//!
//! The branch head commit is resolved, the version file is located at that
//! branch and its `Version:` header is read. Any failure along the way is
//! reported *inside* the decision: `update_available` is false,
//! `latest_version` equals the installed version, and `error` carries the
//! diagnostic. The failure is also written to the audit log.
//!
//! Decisions, degraded ones included, are cached for `cache_ttl` seconds.

pub mod cache;

pub use cache::DecisionCache;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::TagOrder;
use crate::core::{GhPushError, RefSelector, Registration};
use crate::github::{
    GitHubApi, RepoRef, VersionFileHint, VersionLocator, resolve_branch_head_commit,
    resolve_latest_tag,
};
use crate::site::SitePaths;
use crate::store::{AuditLog, LogAction, LogStatus};
use crate::version::{extract_version, is_newer, normalize_tag};

/// Result of an update check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDecision {
    pub update_available: bool,
    pub current_version: String,
    pub latest_version: String,
    /// Archive URL, set only when an update is available
    #[serde(default)]
    pub download_url: Option<String>,
    /// Tag name or branch that was checked
    #[serde(default)]
    pub reference: Option<String>,
    /// Branch head commit (branch mode)
    #[serde(default)]
    pub commit_sha: Option<String>,
    /// Why a branch check degraded to "no update"
    #[serde(default)]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
    /// Served from the decision cache rather than computed by this check
    #[serde(skip)]
    pub cached: bool,
}

impl UpdateDecision {
    /// Whether the decision is younger than `ttl_seconds` at `now`.
    #[must_use]
    pub fn is_valid(&self, ttl_seconds: u64, now: DateTime<Utc>) -> bool {
        let age = now - self.checked_at;
        age.num_seconds() < i64::try_from(ttl_seconds).unwrap_or(i64::MAX)
    }
}

/// `{base}/{owner}/{repo}/archive/refs/tags/{tag}.zip`
#[must_use]
pub fn tag_archive_url(archive_base: &str, repo: &RepoRef, tag: &str) -> String {
    format!(
        "{}/{}/{}/archive/refs/tags/{tag}.zip",
        archive_base.trim_end_matches('/'),
        repo.owner,
        repo.repo
    )
}

/// `{base}/{owner}/{repo}/archive/refs/heads/{branch}.zip`
#[must_use]
pub fn branch_archive_url(archive_base: &str, repo: &RepoRef, branch: &str) -> String {
    format!(
        "{}/{}/{}/archive/refs/heads/{branch}.zip",
        archive_base.trim_end_matches('/'),
        repo.owner,
        repo.repo
    )
}

/// Settings the resolver reads from the global configuration.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub archive_base: String,
    pub cache_ttl: u64,
    pub tag_order: TagOrder,
}

/// Produces [`UpdateDecision`]s for registered components.
pub struct UpdateResolver {
    github: Arc<dyn GitHubApi>,
    site: SitePaths,
    cache: DecisionCache,
    audit: AuditLog,
    settings: ResolverSettings,
}

impl UpdateResolver {
    pub fn new(
        github: Arc<dyn GitHubApi>,
        site: SitePaths,
        cache: DecisionCache,
        audit: AuditLog,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            github,
            site,
            cache,
            audit,
            settings,
        }
    }

    /// Decide whether `registration` has an update.
    ///
    /// Unless `force` is set, a cached decision younger than `cache_ttl` is
    /// returned as is. `force` skips the cache read but still refreshes it.
    pub async fn check(&self, registration: &Registration, force: bool) -> Result<UpdateDecision> {
        if !force && let Some(cached) = self.cache.get(&registration.id, self.settings.cache_ttl) {
            debug!("Using cached update decision for {}", registration.id);
            return Ok(UpdateDecision {
                cached: true,
                ..cached
            });
        }

        let current = self.site.installed_version(registration);
        let decision = match &registration.ref_selector {
            RefSelector::Tag => self.decide_tag(registration, current).await?,
            RefSelector::Branch {
                name,
            } => self.decide_branch(registration, name, current).await,
        };

        if let Err(e) = self.cache.put(&registration.id, &decision) {
            warn!("Failed to cache update decision for {}: {e:#}", registration.id);
        }
        Ok(decision)
    }

    /// Forget the cached decision for a component.
    pub fn invalidate(&self, component_id: &str) -> Result<()> {
        self.cache.invalidate(component_id)
    }

    async fn decide_tag(
        &self,
        registration: &Registration,
        current: String,
    ) -> Result<UpdateDecision, GhPushError> {
        let tag = resolve_latest_tag(
            self.github.as_ref(),
            &registration.repository,
            registration.token(),
            self.settings.tag_order,
        )
        .await?;

        let latest = normalize_tag(&tag).to_string();
        let update_available = is_newer(&latest, &current);
        debug!(
            "{}: installed {current}, latest tag {tag} (update available: {update_available})",
            registration.id
        );

        Ok(UpdateDecision {
            update_available,
            download_url: update_available.then(|| {
                tag_archive_url(&self.settings.archive_base, &registration.repository, &tag)
            }),
            current_version: current,
            latest_version: latest,
            reference: Some(tag),
            commit_sha: None,
            error: None,
            checked_at: Utc::now(),
            cached: false,
        })
    }

    async fn decide_branch(
        &self,
        registration: &Registration,
        branch: &str,
        current: String,
    ) -> UpdateDecision {
        match self.branch_version(registration, branch).await {
            Ok((latest, sha)) => {
                let update_available = is_newer(&latest, &current);
                debug!(
                    "{}: installed {current}, {branch}@{sha} declares {latest} (update available: {update_available})",
                    registration.id
                );
                UpdateDecision {
                    update_available,
                    download_url: update_available.then(|| {
                        branch_archive_url(
                            &self.settings.archive_base,
                            &registration.repository,
                            branch,
                        )
                    }),
                    current_version: current,
                    latest_version: latest,
                    reference: Some(branch.to_string()),
                    commit_sha: Some(sha),
                    error: None,
                    checked_at: Utc::now(),
                    cached: false,
                }
            }
            Err(e) => {
                let message = e.to_string();
                warn!("Branch check for {} degraded: {message}", registration.id);
                if let Err(log_err) = self.audit.append(
                    &registration.id,
                    LogAction::VersionCheck,
                    LogStatus::Error,
                    &message,
                    None,
                ) {
                    warn!("Failed to write audit entry: {log_err:#}");
                }
                UpdateDecision {
                    update_available: false,
                    latest_version: current.clone(),
                    current_version: current,
                    download_url: None,
                    reference: Some(branch.to_string()),
                    commit_sha: None,
                    error: Some(message),
                    checked_at: Utc::now(),
                    cached: false,
                }
            }
        }
    }

    async fn branch_version(
        &self,
        registration: &Registration,
        branch: &str,
    ) -> Result<(String, String), GhPushError> {
        let github = self.github.as_ref();
        let repo = &registration.repository;
        let token = registration.token();

        let commit = resolve_branch_head_commit(github, repo, branch, token).await?;

        let hint = VersionFileHint::for_component(registration.kind, &registration.install_slug);
        let mut locator = VersionLocator::new(github, repo, branch, token);
        let path = locator.locate(&hint).await?;
        let contents = locator.read_file(&path).await?;

        let version = extract_version(&contents);
        if version.is_empty() {
            return Err(GhPushError::VersionNotDeclared {
                path,
            });
        }
        Ok((version, commit.sha))
    }
}
