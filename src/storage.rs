//! Storage subsystem
//!
//! This module persists session records and the per-session artifacts that
//! live next to them (keys, descriptors, logs, report).
//!
//! Components:
//! - `storage_trait`: the Storage trait defining a uniform API.
//! - `types`: the on-disk layout of a session directory.
//! - `file_storage`: filesystem-backed implementation with atomic record writes.

pub mod file_storage;
pub mod storage_trait;
pub mod types;

pub use file_storage::FileStorage;
pub use storage_trait::Storage;
pub use types::SessionPaths;
