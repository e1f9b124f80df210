//! Shared helpers.
//!
//! - [`fs`] - atomic writes, directory copy/move and checksums
//! - [`progress`] - CLI spinners

pub mod fs;
pub mod progress;

pub use fs::{atomic_write, calculate_checksum, copy_dir, ensure_dir, move_dir, remove_dir_all};
pub use progress::Spinner;
