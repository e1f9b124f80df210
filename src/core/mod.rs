//! Core types shared by every part of github-push.
//!
//! - [`error`] - the [`GhPushError`] enum, failure classes and CLI error rendering
//! - [`component`] - component registrations, kinds and ref selectors

pub mod component;
pub mod error;

pub use component::{ComponentKind, DEFAULT_BRANCH, RefSelector, Registration};
pub use error::{ErrorContext, ErrorKind, GhPushError, user_friendly_error};
