use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::{debug, error, info};
use tokio::process::Command;

use crate::configuration::ExternalCommand;
use crate::error_handling::types::CredentialError;
use crate::storage::SessionPaths;

pub const KEY_ALGORITHM: &str = "ed25519";

/// Result of a successful key generation.
///
/// Only the location of the private key is kept; its content is never read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    pub private_key: PathBuf,
    pub public_key: String,
}

/// Generates one passphrase-less ed25519 keypair per session through an
/// external tool (`ssh-keygen` by default).
#[derive(Debug, Clone)]
pub struct CredentialIssuer {
    command: ExternalCommand,
}

impl CredentialIssuer {
    pub fn new(command: ExternalCommand) -> Self {
        Self { command }
    }

    /// Issues a fresh keypair inside `session_dir`.
    ///
    /// Existing key files are removed first, so re-issuing never leaves a
    /// stale key behind.
    pub async fn issue(&self, session_dir: &Path) -> Result<IssuedCredential, CredentialError> {
        let paths = SessionPaths::new(session_dir);
        let private_key = paths.private_key();
        let public_key_path = paths.public_key();

        remove_if_present(&private_key)?;
        remove_if_present(&public_key_path)?;

        debug!(
            "Generating {} keypair at {}",
            KEY_ALGORITHM,
            private_key.display()
        );
        let output = Command::new(&self.command.program)
            .args(&self.command.args)
            .arg("-t")
            .arg(KEY_ALGORITHM)
            .arg("-f")
            .arg(&private_key)
            .arg("-N")
            .arg("")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                error!("Failed to start {}: {}", self.command.program, e);
                CredentialError::KeygenFailure(format!("{}: {}", self.command.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                "{} exited with {}: {}",
                self.command.program,
                output.status,
                stderr.trim()
            );
            return Err(CredentialError::KeygenFailure(format!(
                "{} exited with {}: {}",
                self.command.program,
                output.status,
                stderr.trim()
            )));
        }

        let public_key = fs::read_to_string(&public_key_path)
            .map_err(|e| {
                error!(
                    "Public key {} is unreadable: {}",
                    public_key_path.display(),
                    e
                );
                CredentialError::KeygenFailure(format!(
                    "public key {} is unreadable: {}",
                    public_key_path.display(),
                    e
                ))
            })?
            .trim()
            .to_string();
        if public_key.is_empty() {
            error!("Public key {} is empty", public_key_path.display());
            return Err(CredentialError::KeygenFailure(format!(
                "public key {} is empty",
                public_key_path.display()
            )));
        }

        info!("Issued {} keypair in {}", KEY_ALGORITHM, session_dir.display());
        Ok(IssuedCredential {
            private_key,
            public_key,
        })
    }
}

fn remove_if_present(path: &Path) -> Result<(), CredentialError> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed previous key file {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => {
            error!("Failed to remove key file {}: {}", path.display(), e);
            Err(CredentialError::KeygenFailure(format!(
                "cannot remove {}: {}",
                path.display(),
                e
            )))
        }
    }
}
