//! Storage layer for the index directory.
//!
//! The index lives in one filesystem directory. [`file::FileStorage`] owns the
//! file operations the index needs (atomic replace, durable create, memory
//! mapped reads, directory listing) and [`lock::DirectoryLock`] the exclusive
//! process lock that keeps a second process out of the directory.
//!
//! # Layout
//!
//! ```text
//! <index_dir>/
//!   write.lock            advisory lock, held for the lifetime of an open index
//!   segments_<gen>.json   commit points, highest readable generation wins
//!   <uuid>.seg            immutable segment files
//! ```

pub mod file;
pub mod lock;

pub use file::FileStorage;
pub use lock::DirectoryLock;

/// Name of the lock file inside the index directory.
pub const LOCK_FILE: &str = "write.lock";

/// Suffix of files being written before they are renamed into place.
pub const TEMP_SUFFIX: &str = ".tmp";
