use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error_handling::types::SessionError;
use crate::session_management::SessionStatus;

/// Persisted metadata of one transfer session.
///
/// The record never carries the private key location; it is derived from the
/// session directory by whoever needs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub src_paths: Vec<String>,
    pub dest_path: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub client_host: Option<String>,
    #[serde(default)]
    pub client_user: Option<String>,
    pub status: SessionStatus,
    #[serde(default)]
    pub expected_size_bytes: Option<u64>,
    #[serde(default)]
    pub transfer_rc: Option<i32>,
    #[serde(default)]
    pub cleanup_rc: Option<i32>,
    /// Last engine-level failure, recorded before it is surfaced.
    #[serde(default)]
    pub error: Option<String>,
}

impl Session {
    /// Builds a fresh record in `waiting_for_client` with a newly generated token.
    pub fn new(src_paths: Vec<String>, dest_path: String) -> Self {
        Self {
            token: generate_token(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            src_paths,
            dest_path,
            public_key: String::new(),
            client_host: None,
            client_user: None,
            status: SessionStatus::WaitingForClient,
            expected_size_bytes: None,
            transfer_rc: None,
            cleanup_rc: None,
            error: None,
        }
    }

    /// Moves the session along the status table, refusing anything else.
    pub fn advance(&mut self, next: SessionStatus) -> Result<(), SessionError> {
        if !self.status.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn has_credential(&self) -> bool {
        !self.public_key.is_empty()
    }

    /// Transfer finished but cleanup never ran and nothing went wrong in between.
    pub fn is_awaiting_cleanup(&self) -> bool {
        self.finished_at.is_some() && self.cleanup_rc.is_none() && self.error.is_none()
    }

    /// Accepted, but orchestration has not begun.
    pub fn is_awaiting_start(&self) -> bool {
        self.status == SessionStatus::StartingTransfer
            && self.started_at.is_none()
            && self.error.is_none()
    }

    /// Transfer started and never reported back.
    pub fn is_interrupted_in_transfer(&self) -> bool {
        self.started_at.is_some() && self.finished_at.is_none() && self.error.is_none()
    }
}

fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}
