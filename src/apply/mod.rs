//! Applying updates and rollbacks to the installed site.
//!
//! An update moves through fixed stages:
//!
//! ```text
//! ResolveContext → Backup → Download → Extract → Swap → Reactivate → Notify → Done
//!        └──────────┴──────────┴──────────┴────────┴──────────┴─────────┴──→ Failed
//! ```
//!
//! - **Backup** is best effort: a failed backup is logged and the update
//!   continues.
//! - **Download** and **Extract** failures leave the install untouched.
//! - **Swap** deletes the install directory and moves the new payload in;
//!   a failure here is not rolled back automatically.
//!
//! The component lock is held from the backup until the engine returns.
//! Every terminal failure is written to the audit log and raised as an
//! error notice; the returned error carries an [`ApplyFailure`] context
//! naming the stage.
//!
//! - [`swap`] - extraction, payload detection and directory replacement
//! - [`rollback`] - restoring a backup snapshot

pub mod rollback;
pub mod swap;

pub use rollback::RollbackOutcome;

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::archive::ArchiveFetcher;
use crate::backup::BackupManager;
use crate::core::{GhPushError, Registration};
use crate::lock::ComponentLock;
use crate::notify::{Notice, NoticeKind, Notifier};
use crate::resolver::{DecisionCache, UpdateDecision};
use crate::site::{ActivationState, SitePaths};
use crate::store::{AuditLog, DataLayout, LogAction, LogStatus};
use swap::{extract_archive, payload_root, swap_into};

/// Where an update is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStage {
    ResolveContext,
    Backup,
    Download,
    Extract,
    Swap,
    Reactivate,
    Notify,
    Done,
    Failed,
}

impl fmt::Display for ApplyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ResolveContext => "resolve context",
            Self::Backup => "backup",
            Self::Download => "download",
            Self::Extract => "extract",
            Self::Swap => "swap",
            Self::Reactivate => "reactivate",
            Self::Notify => "notify",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// Context attached to errors returned by the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} of '{component_id}' failed during {stage}")]
pub struct ApplyFailure {
    /// `Update` or `Rollback`
    pub operation: &'static str,
    pub component_id: String,
    pub stage: ApplyStage,
}

/// What an update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    Updated,
    NoUpdate,
}

/// Result of [`ApplyEngine::apply_update`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub component_id: String,
    pub status: UpdateStatus,
    /// Version installed before the operation
    pub previous_version: String,
    /// Version installed now
    pub version: String,
}

impl UpdateOutcome {
    /// Human readable summary.
    #[must_use]
    pub fn message(&self) -> String {
        match self.status {
            UpdateStatus::Updated => format!("Updated to version {}", self.version),
            UpdateStatus::NoUpdate => "No update available".to_string(),
        }
    }
}

/// Runs updates and rollbacks against the site.
pub struct ApplyEngine {
    site: SitePaths,
    layout: DataLayout,
    backups: Arc<BackupManager>,
    fetcher: ArchiveFetcher,
    cache: DecisionCache,
    audit: AuditLog,
    activation: Arc<dyn ActivationState>,
    notifier: Arc<dyn Notifier>,
}

impl ApplyEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        site: SitePaths,
        layout: DataLayout,
        backups: Arc<BackupManager>,
        fetcher: ArchiveFetcher,
        cache: DecisionCache,
        audit: AuditLog,
        activation: Arc<dyn ActivationState>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            site,
            layout,
            backups,
            fetcher,
            cache,
            audit,
            activation,
            notifier,
        }
    }

    /// Install the version described by `decision`.
    ///
    /// When no update is available only an informational audit entry is
    /// written and the install directory is not touched.
    pub async fn apply_update(
        &self,
        registration: &Registration,
        decision: &UpdateDecision,
    ) -> Result<UpdateOutcome> {
        if !decision.update_available {
            self.log(
                registration,
                LogAction::Update,
                LogStatus::Info,
                "No update available",
                Some(&decision.current_version),
            );
            return Ok(UpdateOutcome {
                component_id: registration.id.clone(),
                status: UpdateStatus::NoUpdate,
                previous_version: decision.current_version.clone(),
                version: decision.current_version.clone(),
            });
        }

        match self.run_update(registration, decision).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.report_failure(registration, LogAction::Update, &e);
                Err(e)
            }
        }
    }

    async fn run_update(
        &self,
        registration: &Registration,
        decision: &UpdateDecision,
    ) -> Result<UpdateOutcome> {
        let at = |stage| failure("Update", registration, stage);

        debug!("{}: {}", registration.id, ApplyStage::ResolveContext);
        let context = self
            .site
            .resolve_context(registration, self.activation.as_ref())
            .map_err(at(ApplyStage::ResolveContext))?;
        let url = decision
            .download_url
            .clone()
            .ok_or_else(|| {
                anyhow::Error::from(GhPushError::InvalidInput {
                    message: "update decision has no download URL".to_string(),
                })
            })
            .map_err(at(ApplyStage::ResolveContext))?;

        debug!("{}: {}", registration.id, ApplyStage::Backup);
        let _lock = ComponentLock::acquire(&self.layout.locks_dir(), &registration.id)
            .await
            .map_err(|e| at(ApplyStage::Backup)(e.into()))?;
        match self.backups.create_backup(registration).await {
            Ok(snapshot) => self.log(
                registration,
                LogAction::Backup,
                LogStatus::Success,
                format!("Backup created at {}", snapshot.path.display()),
                Some(&snapshot.version),
            ),
            Err(e) => {
                warn!("Backup of {} failed, continuing: {e:#}", registration.id);
                self.log(
                    registration,
                    LogAction::Backup,
                    LogStatus::Error,
                    format!("Backup failed: {e:#}"),
                    None,
                );
            }
        }

        debug!("{}: {}", registration.id, ApplyStage::Download);
        let archive = self
            .fetcher
            .download_archive(&url, registration.token())
            .await
            .map_err(|e| at(ApplyStage::Download)(e.into()))?;

        debug!("{}: {}", registration.id, ApplyStage::Extract);
        let extract_dir = self.scratch_dir("extract");
        let extracted = extract_payload(archive.clone(), extract_dir.clone()).await;
        remove_scratch_file(&archive).await;
        let payload = match extracted {
            Ok(payload) => payload,
            Err(e) => {
                remove_scratch_dir(&extract_dir).await;
                return Err(at(ApplyStage::Extract)(e));
            }
        };

        debug!("{}: {}", registration.id, ApplyStage::Swap);
        let swapped = swap_blocking(payload, context.dir.clone()).await;
        remove_scratch_dir(&extract_dir).await;
        swapped.map_err(at(ApplyStage::Swap))?;

        debug!("{}: {}", registration.id, ApplyStage::Reactivate);
        if context.active {
            self.activation.activate(registration).map_err(at(ApplyStage::Reactivate))?;
        }

        debug!("{}: {}", registration.id, ApplyStage::Notify);
        self.invalidate_cache(&registration.id);
        let message = format!("Updated to version {}", decision.latest_version);
        self.notifier.notify(Notice::new(
            &registration.id,
            NoticeKind::Updated,
            format!("{} updated to version {}", registration.name, decision.latest_version),
        ));
        self.log(
            registration,
            LogAction::Update,
            LogStatus::Success,
            &message,
            Some(&decision.latest_version),
        );
        info!("{}: {}", registration.id, message);

        Ok(UpdateOutcome {
            component_id: registration.id.clone(),
            status: UpdateStatus::Updated,
            previous_version: decision.current_version.clone(),
            version: decision.latest_version.clone(),
        })
    }

    fn scratch_dir(&self, purpose: &str) -> PathBuf {
        self.layout.tmp_dir().join(format!("{purpose}-{}", uuid::Uuid::new_v4()))
    }

    fn invalidate_cache(&self, component_id: &str) {
        if let Err(e) = self.cache.invalidate(component_id) {
            warn!("Failed to clear cached decision for {component_id}: {e:#}");
        }
    }

    /// Write an audit entry. Audit failures are logged, never raised.
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

    fn report_failure(&self, registration: &Registration, action: LogAction, error: &anyhow::Error) {
        let message = format!("{error:#}");
        self.log(registration, action, LogStatus::Error, &message, None);
        self.notifier.notify(Notice::new(&registration.id, NoticeKind::Error, message));
    }
}

fn failure(
    operation: &'static str,
    registration: &Registration,
    stage: ApplyStage,
) -> impl FnOnce(anyhow::Error) -> anyhow::Error {
    let failure = ApplyFailure {
        operation,
        component_id: registration.id.clone(),
        stage,
    };
    move |e| e.context(failure)
}

/// Extract `archive` into `dest` and return the payload root.
async fn extract_payload(archive: PathBuf, dest: PathBuf) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || -> Result<PathBuf, GhPushError> {
        extract_archive(&archive, &dest)?;
        payload_root(&dest)
    })
    .await
    .context("Extraction task failed")?
    .map_err(Into::into)
}

async fn swap_blocking(payload: PathBuf, install_dir: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || swap_into(&payload, &install_dir))
        .await
        .context("Swap task failed")?
        .map_err(Into::into)
}

async fn remove_scratch_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        debug!("Failed to remove {}: {e}", path.display());
    }
}

async fn remove_scratch_dir(path: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        debug!("Failed to remove {}: {e}", path.display());
    }
}
