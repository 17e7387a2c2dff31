use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use regex::Regex;
use tempfile::NamedTempFile;

use crate::error_handling::types::StorageError;
use crate::reporting::Report;
use crate::session_management::Session;
use crate::storage::storage_trait::Storage;
use crate::storage::types::SessionPaths;

const TOKEN_PATTERN: &str = r"^[A-Za-z0-9_-]{8,64}$";

/// Filesystem-backed session store: one directory per token under `base_path`.
///
/// Records are JSON documents replaced atomically (temp file in the same
/// directory, then rename), so a reader sees either the old or the new record.
pub struct FileStorage {
    base_path: PathBuf,
    token_pattern: Regex,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| {
            error!(
                "Failed to create sessions dir {}: {}",
                base_path.display(),
                e
            );
            StorageError::WriteFailed(format!("{}: {}", base_path.display(), e))
        })?;
        let token_pattern = Regex::new(TOKEN_PATTERN)
            .map_err(|e| StorageError::ReadFailed(format!("token pattern: {}", e)))?;
        info!("FileStorage initialized at {}", base_path.display());

        Ok(Self {
            base_path,
            token_pattern,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn paths_for(&self, token: &str) -> Result<SessionPaths, StorageError> {
        self.session_dir(token).map(SessionPaths::new)
    }

    fn read_record(&self, token: &str, path: &Path) -> Result<Session, StorageError> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                debug!("No session record at {}", path.display());
                StorageError::NotFound(token.to_string())
            } else {
                error!("Failed to read session file {}: {}", path.display(), e);
                StorageError::ReadFailed(format!("{}: {}", path.display(), e))
            }
        })?;
        let session: Session = serde_json::from_str(&content).map_err(|e| {
            error!("Unparseable session file {}: {}", path.display(), e);
            StorageError::NotFound(token.to_string())
        })?;
        if session.token != token {
            error!(
                "Session file {} carries token {}, expected {}",
                path.display(),
                session.token,
                token
            );
            return Err(StorageError::NotFound(token.to_string()));
        }
        Ok(session)
    }
}

/// Writes `bytes` to `target` through a temp file in the same directory.
fn write_atomically(target: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let dir = target.parent().ok_or_else(|| {
        StorageError::WriteFailed(format!("{} has no parent directory", target.display()))
    })?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| {
        error!("Failed to create temp file in {}: {}", dir.display(), e);
        StorageError::WriteFailed(format!("{}: {}", dir.display(), e))
    })?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| {
            error!("Failed to write temp file for {}: {}", target.display(), e);
            StorageError::WriteFailed(format!("{}: {}", target.display(), e))
        })?;
    tmp.persist(target).map_err(|e| {
        error!("Failed to replace {}: {}", target.display(), e.error);
        StorageError::WriteFailed(format!("{}: {}", target.display(), e.error))
    })?;
    Ok(())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec_pretty(value).map_err(|e| StorageError::WriteFailed(e.to_string()))
}

impl Storage for FileStorage {
    fn create_session(&self, session: &Session) -> Result<PathBuf, StorageError> {
        let dir = self.session_dir(&session.token)?;
        fs::create_dir(&dir).map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                warn!("Session directory {} already exists", dir.display());
                StorageError::AlreadyExists(session.token.clone())
            } else {
                error!("Failed to create session dir {}: {}", dir.display(), e);
                StorageError::WriteFailed(format!("{}: {}", dir.display(), e))
            }
        })?;
        self.save_session(session)?;
        info!("Created session {} at {}", session.token, dir.display());
        Ok(dir)
    }

    fn load_session(&self, token: &str) -> Result<Session, StorageError> {
        let paths = self.paths_for(token)?;
        self.read_record(token, &paths.meta())
    }

    fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        let paths = self.paths_for(&session.token)?;
        if !paths.root().is_dir() {
            return Err(StorageError::NotFound(session.token.clone()));
        }
        write_atomically(&paths.meta(), &encode(session)?)?;
        debug!(
            "Saved session {} ({}) to {}",
            session.token,
            session.status,
            paths.meta().display()
        );
        Ok(())
    }

    fn session_dir(&self, token: &str) -> Result<PathBuf, StorageError> {
        if !self.token_pattern.is_match(token) {
            debug!("Rejected malformed token {:?}", token);
            return Err(StorageError::NotFound(token.to_string()));
        }
        Ok(self.base_path.join(token))
    }

    fn list_sessions(&self) -> Result<Vec<Session>, StorageError> {
        let entries = match fs::read_dir(&self.base_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                error!(
                    "Failed to read sessions dir {}: {}",
                    self.base_path.display(),
                    e
                );
                return Err(StorageError::ReadFailed(e.to_string()));
            }
        };

        let mut sessions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                error!("Dir entry error: {}", e);
                StorageError::ReadFailed(e.to_string())
            })?;
            let name = entry.file_name();
            let Some(token) = name.to_str() else { continue };
            if !self.token_pattern.is_match(token) || !entry.path().is_dir() {
                continue;
            }
            match self.load_session(token) {
                Ok(session) => sessions.push(session),
                Err(e) => warn!("Skipping session {}: {}", token, e),
            }
        }
        debug!("Loaded {} session(s)", sessions.len());
        Ok(sessions)
    }

    fn save_report(&self, report: &Report) -> Result<(), StorageError> {
        let paths = self.paths_for(&report.token)?;
        if !paths.root().is_dir() {
            return Err(StorageError::NotFound(report.token.clone()));
        }
        write_atomically(&paths.report(), &encode(report)?)?;
        info!(
            "Saved report for session {} to {}",
            report.token,
            paths.report().display()
        );
        Ok(())
    }

    fn load_report(&self, token: &str) -> Result<Option<Report>, StorageError> {
        let path = self.paths_for(token)?.report();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                error!("Failed to read report {}: {}", path.display(), e);
                return Err(StorageError::ReadFailed(e.to_string()));
            }
        };
        serde_json::from_str(&content).map(Some).map_err(|e| {
            error!("Unparseable report {}: {}", path.display(), e);
            StorageError::ReadFailed(e.to_string())
        })
    }
}
