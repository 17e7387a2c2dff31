//! Orchestration phases of an accepted session.
//!
//! A run walks `Prepare -> Transfer -> Cleanup -> Report -> Done`. The session
//! record is saved at the end of every phase, so the next phase never starts
//! before the previous one is durable.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Write descriptors, compute the expected size, stamp `started_at`.
    Prepare,
    /// Push files with the transfer playbook.
    Transfer,
    /// Revoke the ephemeral key, whatever the transfer outcome.
    Cleanup,
    /// Write the final report.
    Report,
    Done,
}

impl Phase {
    pub fn next(self) -> Phase {
        match self {
            Phase::Prepare => Phase::Transfer,
            Phase::Transfer => Phase::Cleanup,
            Phase::Cleanup => Phase::Report,
            Phase::Report | Phase::Done => Phase::Done,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Prepare => "prepare",
            Phase::Transfer => "transfer",
            Phase::Cleanup => "cleanup",
            Phase::Report => "report",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}
