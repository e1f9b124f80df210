//! Error handling for github-push
//!
//! Two layers, same as the rest of the crate:
//! - [`GhPushError`] is the strongly-typed error returned by the low-level
//!   modules (GitHub access, locator, archive handling, locks).
//! - [`ErrorContext`] wraps an error with a suggestion and details for the CLI.
//!
//! Orchestration code works with [`anyhow::Result`] and attaches context with
//! `.context(...)`. Callers that need the failure class downcast back to
//! [`GhPushError`] and look at [`GhPushError::kind`].
//!
//! # Example
//!
//! ```rust,no_run
//! use github_push::core::{ErrorKind, GhPushError};
//!
//! let err = GhPushError::Busy { id: "my-plugin".to_string() };
//! assert_eq!(err.kind(), ErrorKind::Busy);
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use super::component::ComponentKind;

/// Number of root entries shown in a "version file not found" diagnostic.
const ROOT_LISTING_PREVIEW: usize = 20;

/// Coarse failure class used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad URL, missing slug, malformed id. Never retried.
    InvalidInput,
    /// Registration, repository, tag, file or backup does not exist.
    NotFound,
    /// Non-200 response from GitHub, including rate limiting.
    Api,
    /// Extraction, copy, directory create/delete failures.
    Filesystem,
    /// Malformed base64 or text content.
    Decode,
    /// Another operation holds the component lock.
    Busy,
    /// Configuration file problems.
    Config,
    /// Anything else.
    Other,
}

/// Errors produced by github-push.
#[derive(Error, Debug)]
pub enum GhPushError {
    /// The repository URL does not point at github.com
    #[error("Invalid GitHub URL: {url}")]
    InvalidUrl {
        /// URL as supplied
        url: String,
    },

    /// Input rejected before any work was done
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong
        message: String,
    },

    /// The registration has no install slug
    #[error("No {kind} slug configured for component '{id}'")]
    SlugMissing {
        /// Component id
        id: String,
        /// Plugin or theme
        kind: ComponentKind,
    },

    /// No registration with this id
    #[error("Component '{id}' is not registered")]
    ComponentNotFound {
        /// Requested id
        id: String,
        /// Closest registered id, if any is similar enough
        did_you_mean: Option<String>,
    },

    /// GitHub returned 404 for the repository itself
    #[error("GitHub repository {owner}/{repo} was not found")]
    RepositoryNotFound {
        /// Repository owner
        owner: String,
        /// Repository name
        repo: String,
    },

    /// Tag mode was selected but the repository has no tags
    #[error("No tags found in repository {owner}/{repo}")]
    NoTags {
        /// Repository owner
        owner: String,
        /// Repository name
        repo: String,
    },

    /// Every locator strategy failed
    #[error("{}", version_file_not_found_message(.filename, .tried_paths, .root_listing, .root_error.as_deref(), .owner, .repo, .reference))]
    VersionFileNotFound {
        /// Filename the search was looking for
        filename: String,
        /// Paths probed by the conventional-path strategy
        tried_paths: Vec<String>,
        /// Root directory entries formatted as `name (type)`
        root_listing: Vec<String>,
        /// Error returned by the root listing, if it failed
        root_error: Option<String>,
        /// Repository owner
        owner: String,
        /// Repository name
        repo: String,
        /// Branch or tag that was searched
        reference: String,
    },

    /// The version file exists but declares no usable version
    #[error("No version could be read from {path}. Check that its Version: header is present")]
    VersionNotDeclared {
        /// Path of the file inside the repository
        path: String,
    },

    /// Non-200 GitHub API response
    #[error("GitHub API error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    ApiError {
        /// HTTP status, absent for transport failures
        status: Option<u16>,
        /// Upstream message
        message: String,
    },

    /// Archive download returned a non-200 response or the stream broke
    #[error("Download failed for {url}: {reason}")]
    DownloadFailed {
        /// Archive URL
        url: String,
        /// Status text or transport error
        reason: String,
    },

    /// The download reported success but no file is on disk
    #[error("Downloaded file not found: {path}")]
    DownloadedFileMissing {
        /// Expected location
        path: String,
    },

    /// The component's install directory does not exist
    #[error("{} directory not found: {path}", .kind.label())]
    InstallDirNotFound {
        /// Plugin or theme
        kind: ComponentKind,
        /// Expected directory
        path: String,
    },

    /// No snapshot with an existing archive is recorded for the component
    #[error("No backup available for component '{id}'")]
    NoBackup {
        /// Component id
        id: String,
    },

    /// The requested backup archive does not exist
    #[error("Backup file not found: {path}")]
    BackupNotFound {
        /// Archive path
        path: String,
    },

    /// The backup archive does not match the checksum recorded at creation
    #[error("Backup checksum mismatch for {path}: expected {expected}, got {actual}")]
    BackupChecksumMismatch {
        /// Archive path
        path: String,
        /// Recorded SHA-256
        expected: String,
        /// Current SHA-256
        actual: String,
    },

    /// Zip archive could not be read or unpacked
    #[error("Failed to extract {path}: {reason}")]
    ExtractFailed {
        /// Archive path
        path: String,
        /// Underlying cause
        reason: String,
    },

    /// Moving the new code into the install directory failed
    #[error("Failed to install files into {path}: {reason}")]
    SwapFailed {
        /// Install directory
        path: String,
        /// Underlying cause
        reason: String,
    },

    /// Generic filesystem failure
    #[error("File system error during {operation}: {path}")]
    FileSystemError {
        /// Operation that failed
        operation: String,
        /// Path involved
        path: String,
    },

    /// File content could not be decoded
    #[error("Failed to decode {path}: {reason}")]
    DecodeError {
        /// Path of the file inside the repository
        path: String,
        /// Underlying cause
        reason: String,
    },

    /// The component lock is held by another operation
    #[error("Component '{id}' is busy with another update or rollback")]
    Busy {
        /// Component id
        id: String,
    },

    /// Configuration problem
    #[error("Configuration error: {message}")]
    ConfigError {
        /// What was wrong
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl GhPushError {
    /// Failure class of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl { .. } | Self::InvalidInput { .. } | Self::SlugMissing { .. } => {
                ErrorKind::InvalidInput
            }
            Self::ComponentNotFound { .. }
            | Self::RepositoryNotFound { .. }
            | Self::NoTags { .. }
            | Self::VersionFileNotFound { .. }
            | Self::VersionNotDeclared { .. }
            | Self::NoBackup { .. }
            | Self::BackupNotFound { .. }
            | Self::InstallDirNotFound { .. }
            | Self::DownloadedFileMissing { .. } => ErrorKind::NotFound,
            Self::ApiError { .. } | Self::DownloadFailed { .. } => ErrorKind::Api,
            Self::FileSystemError { .. }
            | Self::ExtractFailed { .. }
            | Self::SwapFailed { .. }
            | Self::BackupChecksumMismatch { .. }
            | Self::IoError(_) => ErrorKind::Filesystem,
            Self::DecodeError { .. } => ErrorKind::Decode,
            Self::Busy { .. } => ErrorKind::Busy,
            Self::ConfigError { .. } | Self::TomlError(_) => ErrorKind::Config,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// True for a GitHub 404.
    #[must_use]
    pub fn is_not_found_response(&self) -> bool {
        matches!(self, Self::ApiError { status: Some(404), .. })
    }
}

impl Clone for GhPushError {
    fn clone(&self) -> Self {
        match self {
            Self::InvalidUrl {
                url,
            } => Self::InvalidUrl {
                url: url.clone(),
            },
            Self::InvalidInput {
                message,
            } => Self::InvalidInput {
                message: message.clone(),
            },
            Self::SlugMissing {
                id,
                kind,
            } => Self::SlugMissing {
                id: id.clone(),
                kind: *kind,
            },
            Self::ComponentNotFound {
                id,
                did_you_mean,
            } => Self::ComponentNotFound {
                id: id.clone(),
                did_you_mean: did_you_mean.clone(),
            },
            Self::RepositoryNotFound {
                owner,
                repo,
            } => Self::RepositoryNotFound {
                owner: owner.clone(),
                repo: repo.clone(),
            },
            Self::NoTags {
                owner,
                repo,
            } => Self::NoTags {
                owner: owner.clone(),
                repo: repo.clone(),
            },
            Self::VersionFileNotFound {
                filename,
                tried_paths,
                root_listing,
                root_error,
                owner,
                repo,
                reference,
            } => Self::VersionFileNotFound {
                filename: filename.clone(),
                tried_paths: tried_paths.clone(),
                root_listing: root_listing.clone(),
                root_error: root_error.clone(),
                owner: owner.clone(),
                repo: repo.clone(),
                reference: reference.clone(),
            },
            Self::VersionNotDeclared {
                path,
            } => Self::VersionNotDeclared {
                path: path.clone(),
            },
            Self::ApiError {
                status,
                message,
            } => Self::ApiError {
                status: *status,
                message: message.clone(),
            },
            Self::DownloadFailed {
                url,
                reason,
            } => Self::DownloadFailed {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::DownloadedFileMissing {
                path,
            } => Self::DownloadedFileMissing {
                path: path.clone(),
            },
            Self::InstallDirNotFound {
                kind,
                path,
            } => Self::InstallDirNotFound {
                kind: *kind,
                path: path.clone(),
            },
            Self::NoBackup {
                id,
            } => Self::NoBackup {
                id: id.clone(),
            },
            Self::BackupNotFound {
                path,
            } => Self::BackupNotFound {
                path: path.clone(),
            },
            Self::BackupChecksumMismatch {
                path,
                expected,
                actual,
            } => Self::BackupChecksumMismatch {
                path: path.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            Self::ExtractFailed {
                path,
                reason,
            } => Self::ExtractFailed {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::SwapFailed {
                path,
                reason,
            } => Self::SwapFailed {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::FileSystemError {
                operation,
                path,
            } => Self::FileSystemError {
                operation: operation.clone(),
                path: path.clone(),
            },
            Self::DecodeError {
                path,
                reason,
            } => Self::DecodeError {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::Busy {
                id,
            } => Self::Busy {
                id: id.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            Self::IoError(e) => Self::IoError(std::io::Error::new(e.kind(), e.to_string())),
            Self::TomlError(e) => Self::TomlError(e.clone()),
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

fn version_file_not_found_message(
    filename: &str,
    tried_paths: &[String],
    root_listing: &[String],
    root_error: Option<&str>,
    owner: &str,
    repo: &str,
    reference: &str,
) -> String {
    let mut message = format!("Version file not found.\nSearched filename: {filename}");
    message.push_str(&format!("\nTried paths: {}", tried_paths.join(", ")));

    if root_listing.is_empty() {
        message.push_str("\nCould not list the repository root.");
        if let Some(err) = root_error {
            message.push_str(&format!(" Error: {err}"));
        }
    } else {
        let preview: Vec<&str> =
            root_listing.iter().take(ROOT_LISTING_PREVIEW).map(String::as_str).collect();
        message.push_str(&format!("\nRepository root: {}", preview.join(", ")));
        if root_listing.len() > ROOT_LISTING_PREVIEW {
            message.push_str(&format!(" ... ({} more)", root_listing.len() - ROOT_LISTING_PREVIEW));
        }
    }

    message.push_str(&format!(
        "\nCheck the file layout of {owner}/{repo} on '{reference}'."
    ));
    message
}

/// An error plus user-facing hints, rendered by the CLI.
///
/// ```rust,no_run
/// use github_push::core::{ErrorContext, GhPushError};
///
/// let context = ErrorContext::new(GhPushError::NoBackup { id: "shop".into() })
///     .with_suggestion("Run `ghpush update shop` first; backups are taken before each update");
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: GhPushError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Wrap an error without hints.
    #[must_use]
    pub const fn new(error: GhPushError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add an actionable suggestion, printed in green.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error, printed in yellow.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details and suggestion to stderr.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with suggestions.
///
/// [`GhPushError`] anywhere in the chain gets a tailored message; IO errors get
/// filesystem guidance; everything else is shown with its cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(push_error) = error.downcast_ref::<GhPushError>() {
        let mut context = create_error_context(push_error.clone());
        let outer = error.to_string();
        if outer != push_error.to_string() && context.details.is_none() {
            context = context.with_details(outer);
        }
        return context;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(GhPushError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check ownership of the plugins, themes and data directories")
                .with_details(io_error.to_string());
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(GhPushError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct")
                .with_details(io_error.to_string());
            }
            _ => {}
        }
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(GhPushError::Other {
        message,
    })
}

fn create_error_context(error: GhPushError) -> ErrorContext {
    match &error {
        GhPushError::InvalidUrl {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Use https://github.com/OWNER/REPO or git@github.com:OWNER/REPO.git",
        ),
        GhPushError::ComponentNotFound {
            did_you_mean,
            ..
        } => {
            let suggestion = match did_you_mean {
                Some(candidate) => format!("Did you mean '{candidate}'?"),
                None => "Run `ghpush component list` to see registered components".to_string(),
            };
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        GhPushError::RepositoryNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check the repository URL and, for private repositories, the access token")
            .with_details("GitHub answers 404 for private repositories when no valid token is sent"),
        GhPushError::NoTags {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Create a release tag, or register the component with a branch instead of tags",
        ),
        GhPushError::VersionFileNotFound {
            ..
        }
        | GhPushError::VersionNotDeclared {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Make sure the main plugin file (or style.css for themes) carries a 'Version:' header",
        ),
        GhPushError::ApiError {
            status: Some(403),
            ..
        }
        | GhPushError::ApiError {
            status: Some(429),
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Configure an access token for the component to raise the rate limit")
            .with_details("Unauthenticated GitHub API requests are limited to 60 per hour"),
        GhPushError::ApiError {
            status: Some(401),
            ..
        } => ErrorContext::new(error)
            .with_suggestion("The access token was rejected; generate a new one and update the component"),
        GhPushError::InstallDirNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check plugins_dir / themes_dir in the configuration and the component slug"),
        GhPushError::NoBackup {
            ..
        }
        | GhPushError::BackupNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run `ghpush backups <id>` to see retained backups"),
        GhPushError::BackupChecksumMismatch {
            ..
        } => ErrorContext::new(error)
            .with_details("The backup archive changed after it was created and will not be restored"),
        GhPushError::SwapFailed {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Restore the previous version with `ghpush rollback <id>`")
            .with_details("The old files were already removed when the failure happened"),
        GhPushError::Busy {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Wait for the running update or rollback to finish and try again"),
        GhPushError::TomlError(_)
        | GhPushError::ConfigError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check the configuration file; `ghpush config path` shows where it lives"),
        _ => ErrorContext::new(error),
    }
}
