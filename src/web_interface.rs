//! HTTP surface: embedded pages plus the JSON API over the session engine.

pub mod routes;
pub mod types;
pub mod web_server;

pub use types::ApiError;
pub use web_server::WebServer;
