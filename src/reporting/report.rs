use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session_management::{Session, SessionStatus};

/// Flat outcome record written once, after cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub token: String,
    pub status: SessionStatus,
    pub src_paths: Vec<String>,
    pub dest_path: String,
    pub client_host: Option<String>,
    pub client_user: Option<String>,
    pub expected_size_bytes: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub transfer_rc: Option<i32>,
    pub cleanup_rc: Option<i32>,
}

impl Report {
    pub fn summarize(session: &Session) -> Self {
        Self {
            token: session.token.clone(),
            status: session.status,
            src_paths: session.src_paths.clone(),
            dest_path: session.dest_path.clone(),
            client_host: session.client_host.clone(),
            client_user: session.client_user.clone(),
            expected_size_bytes: session.expected_size_bytes,
            started_at: session.started_at,
            finished_at: session.finished_at,
            transfer_rc: session.transfer_rc,
            cleanup_rc: session.cleanup_rc,
        }
    }
}
