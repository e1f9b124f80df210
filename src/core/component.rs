//! Component registration types.
//!
//! A [`Registration`] ties one installed plugin or theme to the GitHub
//! repository it is updated from. Registrations are created by the admin
//! surface, persisted by [`crate::store::registrations`], and read by every
//! other part of the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::GhPushError;
use crate::github::RepoRef;

/// Branch used when a registration does not name one.
pub const DEFAULT_BRANCH: &str = "main";

/// What kind of WordPress component is being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// A plugin under the plugins directory
    Plugin,
    /// A theme under the themes directory
    Theme,
}

impl ComponentKind {
    /// Capitalized label used in messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Plugin => "Plugin",
            Self::Theme => "Theme",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plugin => write!(f, "plugin"),
            Self::Theme => write!(f, "theme"),
        }
    }
}

impl FromStr for ComponentKind {
    type Err = GhPushError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plugin" => Ok(Self::Plugin),
            "theme" => Ok(Self::Theme),
            other => Err(GhPushError::InvalidInput {
                message: format!("unknown component kind '{other}' (expected plugin or theme)"),
            }),
        }
    }
}

/// Which ref counts as "latest" for a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RefSelector {
    /// Most recent GitHub tag
    Tag,
    /// Head of a named branch
    Branch {
        /// Branch name
        #[serde(default = "default_branch")]
        name: String,
    },
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

impl Default for RefSelector {
    fn default() -> Self {
        Self::Branch {
            name: default_branch(),
        }
    }
}

impl RefSelector {
    /// Branch searched for the version file and used for branch archives.
    ///
    /// Tag-mode registrations still search the default branch when validated.
    #[must_use]
    pub fn branch(&self) -> &str {
        match self {
            Self::Tag => DEFAULT_BRANCH,
            Self::Branch {
                name,
            } => name,
        }
    }

    /// True when tags decide the latest version.
    #[must_use]
    pub const fn uses_tags(&self) -> bool {
        matches!(self, Self::Tag)
    }
}

impl fmt::Display for RefSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag => write!(f, "latest tag"),
            Self::Branch {
                name,
            } => write!(f, "branch {name}"),
        }
    }
}

/// One tracked plugin or theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Stable identifier, immutable once created
    pub id: String,
    /// Display name
    pub name: String,
    /// Plugin or theme
    pub kind: ComponentKind,
    /// Repository URL as entered
    pub repo_url: String,
    /// Owner and name parsed from `repo_url`
    pub repository: RepoRef,
    /// Tag or branch policy
    #[serde(default)]
    pub ref_selector: RefSelector,
    /// Plugin entry file relative to the plugins dir, or theme directory name
    pub install_slug: String,
    /// Access token sent to GitHub. Stored in plaintext.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// Token as an optional `&str`, treating empty strings as absent.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Check that an id can be used inside file names.
pub fn validate_component_id(id: &str) -> Result<(), GhPushError> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(GhPushError::InvalidInput {
            message: format!(
                "component id '{id}' may only contain letters, digits, '.', '-' and '_'"
            ),
        })
    }
}

/// Build an id from a display name: `slugified-name-<unix seconds>`.
#[must_use]
pub fn generate_component_id(name: &str, now: DateTime<Utc>) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    let slug = if slug.is_empty() { "component" } else { slug };
    format!("{slug}-{}", now.timestamp())
}
