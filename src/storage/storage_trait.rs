//! Storage Trait
//!
//! This module defines the `Storage` trait, the interface between the session
//! orchestrator and wherever session records are kept.
//!
//! Implementors of this trait are responsible for:
//! - Creating a session location exactly once per token
//! - Persisting and retrieving complete session records
//! - Persisting the final report of a session
//!
//! All methods return a `Result` to handle potential storage errors.

use std::path::PathBuf;

use crate::error_handling::types::StorageError;
use crate::reporting::Report;
use crate::session_management::Session;

pub trait Storage: Send + Sync {
    /// Creates the session location and writes the initial record.
    ///
    /// Fails with `StorageError::AlreadyExists` if the token is already taken.
    fn create_session(&self, session: &Session) -> Result<PathBuf, StorageError>;

    /// Loads a session record. Missing or unparseable records are `NotFound`.
    fn load_session(&self, token: &str) -> Result<Session, StorageError>;

    /// Replaces the full session record.
    fn save_session(&self, session: &Session) -> Result<(), StorageError>;

    /// Directory holding every artifact of the session.
    fn session_dir(&self, token: &str) -> Result<PathBuf, StorageError>;

    /// All readable session records.
    fn list_sessions(&self) -> Result<Vec<Session>, StorageError>;

    fn save_report(&self, report: &Report) -> Result<(), StorageError>;

    /// The report of a session, or `None` if it has not been written yet.
    fn load_report(&self, token: &str) -> Result<Option<Report>, StorageError>;
}
