//! Ephemeral per-session SSH credentials.
//!
//! Re-exports:
//! - [`CredentialIssuer`]: runs the key-generation tool inside a session directory.
//! - [`IssuedCredential`]: where the private key ended up and the public key text.

pub mod credential_issuer;

pub use credential_issuer::{CredentialIssuer, IssuedCredential};
