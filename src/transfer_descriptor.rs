//! Inputs for the external automation tool.
//!
//! - `builder`: writes the inventory (one managed target) and the parameter file.
//! - `disk_usage`: expected transfer size of a list of source paths.

pub mod builder;
pub mod disk_usage;

pub use builder::{build_inventory, build_parameters, TransferParameters};
pub use disk_usage::total_size;
