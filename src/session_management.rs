//! Session management core module.
//!
//! This module provides the core types and submodules for driving a transfer
//! session from creation to cleanup: the session record, the status state
//! machine, the orchestrator and the worker queue that runs accepted sessions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Submodule for the background orchestration queue.
pub mod dispatcher;
/// Submodule for orchestration phases.
pub mod phase;
/// Submodule for session data structures and utilities.
pub mod session;
/// Submodule for session manager implementation.
pub mod session_manager;

pub use dispatcher::Dispatcher;
pub use phase::Phase;
pub use session::Session;
pub use session_manager::SessionManager;

/// Represents the current status of a session.
///
/// Variants:
/// - `WaitingForClient`: keypair issued, waiting for the client to accept.
/// - `StartingTransfer`: client details recorded, orchestration under way.
/// - `TransferSuccess`: the transfer playbook exited with code 0.
/// - `TransferFailed`: the transfer playbook exited with any other code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    WaitingForClient,
    StartingTransfer,
    TransferSuccess,
    TransferFailed,
}

impl SessionStatus {
    /// Every allowed `(from, to)` pair. Anything else is rejected.
    pub const TRANSITIONS: [(SessionStatus, SessionStatus); 3] = [
        (SessionStatus::WaitingForClient, SessionStatus::StartingTransfer),
        (SessionStatus::StartingTransfer, SessionStatus::TransferSuccess),
        (SessionStatus::StartingTransfer, SessionStatus::TransferFailed),
    ];

    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        Self::TRANSITIONS.contains(&(self, next))
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::TransferSuccess | SessionStatus::TransferFailed
        )
    }

    /// Terminal status for a transfer exit code.
    pub fn from_transfer_rc(rc: i32) -> Self {
        if rc == 0 {
            SessionStatus::TransferSuccess
        } else {
            SessionStatus::TransferFailed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::WaitingForClient => "waiting_for_client",
            SessionStatus::StartingTransfer => "starting_transfer",
            SessionStatus::TransferSuccess => "transfer_success",
            SessionStatus::TransferFailed => "transfer_failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
