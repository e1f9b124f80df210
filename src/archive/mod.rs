//! Archive handling.
//!
//! - [`fetch`] - download GitHub archives into the scratch directory
//!
//! Extraction lives with the swap step in [`crate::apply::swap`] because it
//! is only ever done right before installing.

pub mod fetch;

pub use fetch::ArchiveFetcher;
