pub mod config;
pub mod types;

pub use config::{CommandLine, Config};
pub use types::ExternalCommand;
