pub mod configuration;
pub use configuration::*;

pub mod controller;
pub use controller::*;

pub mod credentials;
pub mod error_handling;
pub mod process_runner;
pub mod reporting;

pub mod session_management;
pub use session_management::*;

pub mod storage;
pub mod transfer_descriptor;
pub mod web_interface;

#[cfg(test)]
pub(crate) mod test_support;
