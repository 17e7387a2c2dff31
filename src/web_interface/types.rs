use serde::{Deserialize, Serialize};

use crate::session_management::SessionStatus;

/// API error payload
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
}

/// Source paths as a JSON list or as one comma-separated string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SourcePaths {
    List(Vec<String>),
    Joined(String),
}

impl SourcePaths {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            SourcePaths::List(paths) => paths,
            SourcePaths::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        }
    }
}

/// Body of `POST /api/sessions`
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub src_paths: SourcePaths,
    #[serde(default)]
    pub dest_path: Option<String>,
}

/// Reply to `POST /api/sessions`
#[derive(Debug, Serialize)]
pub struct CreatedSession {
    pub token: String,
    pub share_url: String,
    pub public_key: String,
}

/// Reply to `POST /api/sessions/<token>/accept`
#[derive(Debug, Serialize)]
pub struct AcceptedSession {
    pub token: String,
    pub status: SessionStatus,
    pub status_url: String,
}
