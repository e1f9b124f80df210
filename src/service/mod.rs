//! The [`GitHubPush`] facade.
//!
//! One object wires the stores, the resolver, the backup manager and the
//! apply engine together and exposes the operations the admin surface needs,
//! all keyed by component id. It holds no per-call state; build it once per
//! process with [`GitHubPush::from_config`] or [`GitHubPushBuilder`].
//!
//! ```rust,no_run
//! use github_push::config::GlobalConfig;
//! use github_push::service::GitHubPush;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let push = GitHubPush::from_config(GlobalConfig::load().await?)?;
//! for entry in push.check_all().await? {
//!     println!("{}: {}", entry.component_id, entry.summary());
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strsim::levenshtein;
use tracing::{debug, info, warn};

use crate::apply::{ApplyEngine, RollbackOutcome, UpdateOutcome};
use crate::archive::ArchiveFetcher;
use crate::backup::BackupManager;
use crate::config::GlobalConfig;
use crate::core::component::{generate_component_id, validate_component_id};
use crate::core::{ComponentKind, GhPushError, RefSelector, Registration};
use crate::github::{
    GitHubApi, GitHubClient, RepoInfo, ValidationReport, get_repo_info, parse_repository_url,
    validate_repository,
};
use crate::notify::{Notice, NoticeKind, NoticeStore, Notifier};
use crate::resolver::{DecisionCache, ResolverSettings, UpdateDecision, UpdateResolver};
use crate::site::{ActivationState, FileActivation, SitePaths};
use crate::store::{AuditLog, BackupSnapshot, DataLayout, LogAction, LogEntry, LogStatus, RegistrationStore};

/// Closest-id suggestions must be within this share of the requested id's length.
const SUGGESTION_THRESHOLD_PERCENT: usize = 50;

/// Input for [`GitHubPush::register_component`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComponent {
    /// Generated from `name` when absent
    pub id: Option<String>,
    pub name: String,
    pub kind: ComponentKind,
    pub repo_url: String,
    pub ref_selector: RefSelector,
    pub install_slug: String,
    pub token: Option<String>,
}

/// What [`GitHubPush::remove_component`] deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedComponent {
    pub registration: Registration,
    pub backups_removed: usize,
}

/// Per-component result of [`GitHubPush::check_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckAllEntry {
    pub component_id: String,
    pub decision: Option<UpdateDecision>,
    /// Set when `auto_update` applied an available update
    pub outcome: Option<UpdateOutcome>,
    pub error: Option<String>,
}

impl CheckAllEntry {
    /// One-line description for listings.
    #[must_use]
    pub fn summary(&self) -> String {
        if let Some(error) = &self.error {
            return format!("error: {error}");
        }
        if let Some(outcome) = &self.outcome {
            return outcome.message();
        }
        match &self.decision {
            Some(d) if d.update_available => {
                format!("update available {} -> {}", d.current_version, d.latest_version)
            }
            Some(d) => match &d.error {
                Some(error) => format!("up to date at {} ({error})", d.current_version),
                None => format!("up to date at {}", d.current_version),
            },
            None => "not checked".to_string(),
        }
    }
}

/// Assembles a [`GitHubPush`], optionally with injected collaborators.
pub struct GitHubPushBuilder {
    config: GlobalConfig,
    github: Option<Arc<dyn GitHubApi>>,
    notifier: Option<Arc<dyn Notifier>>,
    activation: Option<Arc<dyn ActivationState>>,
}

impl GitHubPushBuilder {
    #[must_use]
    pub fn new(config: GlobalConfig) -> Self {
        Self {
            config,
            github: None,
            notifier: None,
            activation: None,
        }
    }

    /// Use this GitHub implementation instead of [`GitHubClient`].
    #[must_use]
    pub fn github(mut self, github: Arc<dyn GitHubApi>) -> Self {
        self.github = Some(github);
        self
    }

    /// Send notices here instead of the notice history.
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Track activation here instead of `activation.json`.
    #[must_use]
    pub fn activation(mut self, activation: Arc<dyn ActivationState>) -> Self {
        self.activation = Some(activation);
        self
    }

    pub fn build(self) -> Result<GitHubPush> {
        let config = self.config;
        config.validate()?;

        let layout = DataLayout::new(config.data_dir()?);
        let site = SitePaths::from_config(&config)?;
        let notices = Arc::new(NoticeStore::new(layout.notices(), config.max_notices));

        let github: Arc<dyn GitHubApi> = match self.github {
            Some(github) => github,
            None => Arc::new(GitHubClient::new(&config)?),
        };
        let notifier: Arc<dyn Notifier> = match self.notifier {
            Some(notifier) => notifier,
            None => notices.clone(),
        };
        let activation: Arc<dyn ActivationState> = match self.activation {
            Some(activation) => activation,
            None => Arc::new(FileActivation::new(layout.activation())),
        };

        let audit = AuditLog::new(layout.audit_log());
        let cache = DecisionCache::new(layout.cache_dir());
        let backups = Arc::new(BackupManager::new(site.clone(), &layout, config.max_backups));

        let resolver = UpdateResolver::new(
            github.clone(),
            site.clone(),
            cache.clone(),
            audit.clone(),
            ResolverSettings {
                archive_base: config.archive_base.clone(),
                cache_ttl: config.cache_ttl,
                tag_order: config.tag_order,
            },
        );
        let engine = ApplyEngine::new(
            site.clone(),
            layout.clone(),
            backups.clone(),
            ArchiveFetcher::new(github.clone(), layout.tmp_dir()),
            cache,
            audit.clone(),
            activation.clone(),
            notifier.clone(),
        );

        debug!("Data directory: {}", layout.root().display());
        Ok(GitHubPush {
            registrations: RegistrationStore::new(layout.registrations()),
            auto_update: config.auto_update,
            layout,
            site,
            github,
            audit,
            notices,
            notifier,
            activation,
            backups,
            resolver,
            engine,
        })
    }
}

/// Entry point for every github-push operation.
pub struct GitHubPush {
    layout: DataLayout,
    site: SitePaths,
    auto_update: bool,
    github: Arc<dyn GitHubApi>,
    registrations: RegistrationStore,
    audit: AuditLog,
    notices: Arc<NoticeStore>,
    notifier: Arc<dyn Notifier>,
    activation: Arc<dyn ActivationState>,
    backups: Arc<BackupManager>,
    resolver: UpdateResolver,
    engine: ApplyEngine,
}

impl GitHubPush {
    /// Build with the reqwest client, the notice history and `activation.json`.
    pub fn from_config(config: GlobalConfig) -> Result<Self> {
        GitHubPushBuilder::new(config).build()
    }

    #[must_use]
    pub fn builder(config: GlobalConfig) -> GitHubPushBuilder {
        GitHubPushBuilder::new(config)
    }

    #[must_use]
    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    #[must_use]
    pub fn site(&self) -> &SitePaths {
        &self.site
    }

    /// Registration for `id`.
    ///
    /// # Errors
    ///
    /// [`GhPushError::ComponentNotFound`], with the closest registered id as
    /// a suggestion when one is similar enough.
    pub fn component(&self, id: &str) -> Result<Registration> {
        if let Some(registration) = self.registrations.get(id)? {
            return Ok(registration);
        }

        let ids: Vec<String> = self.registrations.list()?.into_iter().map(|r| r.id).collect();
        Err(GhPushError::ComponentNotFound {
            id: id.to_string(),
            did_you_mean: closest_id(id, &ids),
        }
        .into())
    }

    /// All registrations ordered by id.
    pub fn list_components(&self) -> Result<Vec<Registration>> {
        self.registrations.list()
    }

    /// Store a new registration.
    ///
    /// The id must be file-name safe, the URL must point at GitHub, the slug
    /// must resolve to an install directory, and no other component of the
    /// same kind may use the slug. The repository itself is not contacted;
    /// call [`Self::validate_repository`] first for that.
    pub fn register_component(&self, new: NewComponent) -> Result<Registration> {
        let now = Utc::now();
        let id = match new.id {
            Some(id) => id,
            None => generate_component_id(&new.name, now),
        };
        validate_component_id(&id)?;
        let repository = parse_repository_url(&new.repo_url)?;

        let install_slug = new.install_slug.trim().to_string();
        let registration = Registration {
            id,
            name: new.name,
            kind: new.kind,
            repo_url: new.repo_url,
            repository,
            ref_selector: new.ref_selector,
            install_slug,
            token: new.token.filter(|t| !t.is_empty()),
            created_at: now,
            updated_at: now,
        };
        self.site.install_dir(&registration)?;

        if let Some(existing) =
            self.registrations.find_by_slug(registration.kind, &registration.install_slug)?
        {
            return Err(GhPushError::InvalidInput {
                message: format!(
                    "{} '{}' is already registered as '{}'",
                    registration.kind, registration.install_slug, existing.id
                ),
            }
            .into());
        }

        self.registrations.insert(registration.clone())?;
        info!("Registered {} {} from {}", registration.kind, registration.id, registration.repository);
        Ok(registration)
    }

    /// Delete a registration and its cached decision.
    ///
    /// Backups (records and archives) go too unless `keep_backups` is set.
    /// Audit entries are kept.
    pub fn remove_component(&self, id: &str, keep_backups: bool) -> Result<RemovedComponent> {
        let registration = self.component(id)?;
        self.registrations.remove(id)?;

        if let Err(e) = self.resolver.invalidate(id) {
            warn!("Failed to clear cached decision for {id}: {e:#}");
        }
        let backups_removed = if keep_backups {
            0
        } else {
            self.backups.remove_backups(id)?
        };

        info!("Removed component {id} ({backups_removed} backups deleted)");
        Ok(RemovedComponent {
            registration,
            backups_removed,
        })
    }

    /// Mark a component active or inactive.
    pub fn set_active(&self, id: &str, active: bool) -> Result<()> {
        let registration = self.component(id)?;
        if active {
            self.activation.activate(&registration)
        } else {
            self.activation.deactivate(&registration)
        }
    }

    /// Whether a component is currently active.
    pub fn is_active(&self, id: &str) -> Result<bool> {
        let registration = self.component(id)?;
        self.activation.is_active(&registration)
    }

    /// Decide whether a component has an update and record the check.
    ///
    /// The audit log gets `version_check/success` when an update is
    /// available, `info` when not, and `error` when the check fails. A branch
    /// check that degraded has already logged its own error entry. Only a
    /// freshly computed decision raises an `UpdateAvailable` notice.
    pub async fn check_for_updates(&self, id: &str, force: bool) -> Result<UpdateDecision> {
        let registration = self.component(id)?;

        let decision = match self.resolver.check(&registration, force).await {
            Ok(decision) => decision,
            Err(e) => {
                self.log(&registration, LogAction::VersionCheck, LogStatus::Error, format!("{e:#}"), None);
                return Err(e.context(format!("Update check for '{id}' failed")));
            }
        };

        if decision.update_available {
            self.log(
                &registration,
                LogAction::VersionCheck,
                LogStatus::Success,
                format!("Version {} is available", decision.latest_version),
                Some(&decision.latest_version),
            );
        }
        if decision.update_available && !decision.cached {
            self.notifier.notify(Notice::new(
                id,
                NoticeKind::UpdateAvailable,
                format!(
                    "{} {} is available (installed {})",
                    registration.name, decision.latest_version, decision.current_version
                ),
            ));
        }
        if !decision.update_available && decision.error.is_none() {
            self.log(
                &registration,
                LogAction::VersionCheck,
                LogStatus::Info,
                format!("Installed version {} is up to date", decision.current_version),
                Some(&decision.current_version),
            );
        }
        Ok(decision)
    }

    /// Check against GitHub, bypassing the cache, and install the result.
    pub async fn update_plugin(&self, id: &str) -> Result<UpdateOutcome> {
        let registration = self.component(id)?;

        let decision = match self.resolver.check(&registration, true).await {
            Ok(decision) => decision,
            Err(e) => {
                let message = format!("{e:#}");
                self.log(&registration, LogAction::Update, LogStatus::Error, &message, None);
                self.notifier.notify(Notice::new(id, NoticeKind::Error, message));
                return Err(e.context(format!("Update of '{id}' failed")));
            }
        };

        self.engine.apply_update(&registration, &decision).await
    }

    /// Restore a backup. See [`ApplyEngine::rollback`].
    pub async fn rollback(
        &self,
        id: &str,
        backup_path: Option<&Path>,
        version_label: Option<&str>,
    ) -> Result<RollbackOutcome> {
        let registration = self.component(id)?;
        self.engine.rollback(&registration, backup_path, version_label).await
    }

    /// Repository metadata for any GitHub URL.
    pub async fn get_repo_info(&self, url: &str, token: Option<&str>) -> Result<RepoInfo> {
        Ok(get_repo_info(self.github.as_ref(), url, token).await?)
    }

    /// Installed version of a component, `0.0.0` when unreadable.
    pub fn get_current_version(&self, id: &str) -> Result<String> {
        let registration = self.component(id)?;
        Ok(self.site.installed_version(&registration))
    }

    /// Check that `url` can serve as the update source for `install_slug`.
    pub async fn validate_repository(
        &self,
        url: &str,
        install_slug: &str,
        kind: ComponentKind,
        branch: &str,
        token: Option<&str>,
    ) -> Result<ValidationReport> {
        validate_repository(self.github.as_ref(), url, install_slug, kind, branch, token)
            .await
            .with_context(|| format!("Repository {url} cannot be used for {kind} '{install_slug}'"))
    }

    /// Snapshots of a component, newest first.
    pub fn list_backups(&self, id: &str) -> Result<Vec<BackupSnapshot>> {
        let registration = self.component(id)?;
        self.backups.list_backups(&registration.id)
    }

    /// Backup taken right before the event recorded by audit entry `log_id`.
    pub fn backup_for_log_entry(&self, log_id: u64) -> Result<Option<BackupSnapshot>> {
        let Some(entry) = self.audit.get_entry(log_id)? else {
            return Err(GhPushError::InvalidInput {
                message: format!("no audit log entry with id {log_id}"),
            }
            .into());
        };
        self.backups.backup_for_log_entry(&entry.component_id, entry.created_at)
    }

    /// Audit entries newest first.
    pub fn get_logs(&self, id: Option<&str>, limit: usize, offset: usize) -> Result<Vec<LogEntry>> {
        self.audit.get_logs(id, limit, offset)
    }

    pub fn get_log_count(&self, id: Option<&str>) -> Result<usize> {
        self.audit.get_log_count(id)
    }

    /// Check every registered component, applying updates when
    /// `auto_update` is configured. Failures are collected per component.
    pub async fn check_all(&self) -> Result<Vec<CheckAllEntry>> {
        let mut results = Vec::new();
        for registration in self.registrations.list()? {
            let id = registration.id.clone();
            let mut entry = CheckAllEntry {
                component_id: id.clone(),
                decision: None,
                outcome: None,
                error: None,
            };

            match self.check_for_updates(&id, false).await {
                Ok(decision) => {
                    if decision.update_available && self.auto_update {
                        match self.engine.apply_update(&registration, &decision).await {
                            Ok(outcome) => entry.outcome = Some(outcome),
                            Err(e) => entry.error = Some(format!("{e:#}")),
                        }
                    }
                    entry.decision = Some(decision);
                }
                Err(e) => {
                    warn!("Check of {id} failed: {e:#}");
                    entry.error = Some(format!("{e:#}"));
                }
            }
            results.push(entry);
        }
        Ok(results)
    }

    /// Notice history, newest first.
    pub fn notices(&self) -> Result<Vec<Notice>> {
        self.notices.list()
    }

    pub fn clear_notices(&self) -> Result<()> {
        self.notices.clear()
    }

    /// Directory holding backup archives.
    #[must_use]
    pub fn backups_dir(&self) -> PathBuf {
        self.layout.backups_dir()
    }

    fn log(
        &self,
        registration: &Registration,
        action: LogAction,
        status: LogStatus,
        message: impl Into<String>,
        version: Option<&str>,
    ) {
        if let Err(e) = self.audit.append(&registration.id, action, status, message, version) {
            warn!("Failed to write audit entry for {}: {e:#}", registration.id);
        }
    }
}

fn closest_id(target: &str, ids: &[String]) -> Option<String> {
    let limit = target.len() * SUGGESTION_THRESHOLD_PERCENT / 100;
    ids.iter()
        .map(|id| (id, levenshtein(target, id)))
        .filter(|(_, distance)| *distance <= limit)
        .min_by_key(|(_, distance)| *distance)
        .map(|(id, _)| id.clone())
}
