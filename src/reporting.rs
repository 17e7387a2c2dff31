//! Final summaries of completed sessions.

pub mod report;

pub use report::Report;
