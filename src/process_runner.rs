//! External process execution with live log capture.
//!
//! [`ProcessRunner`] launches an external command, pumps its stdout and stderr
//! into one session log as lines arrive, and hands back the exit code.
//! [`log_tail::tail_lines`] reads the end of such a log for status views.

pub mod log_tail;
pub mod runner;

pub use log_tail::tail_lines;
pub use runner::ProcessRunner;
