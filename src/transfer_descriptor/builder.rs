use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error_handling::types::DescriptorError;
use crate::storage::SessionPaths;

/// Inventory group the single target belongs to; playbooks address it by name.
pub const TARGET_GROUP: &str = "target";
pub const TARGET_ALIAS: &str = "client";

/// Extra variables handed to both playbooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParameters {
    pub src_paths: Vec<String>,
    pub dest_path: String,
    pub client_user: String,
    pub public_key: String,
}

/// Writes `inventory.ini` naming exactly one host reached with `private_key`.
pub fn build_inventory(
    paths: &SessionPaths,
    host: &str,
    user: &str,
    private_key: &Path,
) -> Result<PathBuf, DescriptorError> {
    let inventory = paths.inventory();
    let content = format!(
        "[{group}]\n{alias} ansible_host={host} ansible_user={user} ansible_ssh_private_key_file={key}\n",
        group = TARGET_GROUP,
        alias = TARGET_ALIAS,
        host = host,
        user = user,
        key = private_key.display(),
    );
    fs::write(&inventory, content)?;
    debug!("Wrote inventory {}", inventory.display());
    Ok(inventory)
}

/// Writes the parameter file consumed through `--extra-vars @<file>`.
///
/// The file is JSON, which the automation tool reads as YAML.
pub fn build_parameters(
    paths: &SessionPaths,
    src_paths: &[String],
    dest_path: &str,
    client_user: &str,
    public_key: &str,
) -> Result<PathBuf, DescriptorError> {
    if src_paths.is_empty() {
        return Err(DescriptorError::MissingInput("src_paths"));
    }
    if dest_path.trim().is_empty() {
        return Err(DescriptorError::MissingInput("dest_path"));
    }

    let parameters = TransferParameters {
        src_paths: src_paths.to_vec(),
        dest_path: dest_path.to_string(),
        client_user: client_user.to_string(),
        public_key: public_key.to_string(),
    };
    let encoded = serde_json::to_vec_pretty(&parameters)
        .map_err(|e| DescriptorError::EncodeFailed(e.to_string()))?;

    let path = paths.parameters();
    fs::write(&path, encoded)?;
    debug!("Wrote transfer parameters {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn inventory_names_one_target() {
        let dir = TempDir::new().unwrap();
        let paths = SessionPaths::new(dir.path());
        let key = dir.path().join("id_ed25519");

        let written = build_inventory(&paths, "10.0.0.5", "u", &key).unwrap();

        assert_eq!(written, dir.path().join("inventory.ini"));
        let content = fs::read_to_string(written).unwrap();
        assert_eq!(
            content,
            format!(
                "[target]\nclient ansible_host=10.0.0.5 ansible_user=u ansible_ssh_private_key_file={}\n",
                key.display()
            )
        );
    }

    #[test]
    fn parameters_carry_the_four_inputs() {
        let dir = TempDir::new().unwrap();
        let paths = SessionPaths::new(dir.path());
        let src = vec!["/data/a.txt".to_string(), "/data/dir".to_string()];

        let written =
            build_parameters(&paths, &src, "/home/u/in", "u", "ssh-ed25519 AAAA x").unwrap();

        let parsed: TransferParameters =
            serde_json::from_slice(&fs::read(written).unwrap()).unwrap();
        assert_eq!(
            parsed,
            TransferParameters {
                src_paths: src,
                dest_path: "/home/u/in".into(),
                client_user: "u".into(),
                public_key: "ssh-ed25519 AAAA x".into(),
            }
        );
    }

    #[test]
    fn rebuilding_overwrites_previous_file() {
        let dir = TempDir::new().unwrap();
        let paths = SessionPaths::new(dir.path());
        let src = vec!["/a".to_string()];
        build_parameters(&paths, &src, "/first", "u", "k").unwrap();
        build_parameters(&paths, &src, "/second", "u", "k").unwrap();

        let parsed: TransferParameters =
            serde_json::from_slice(&fs::read(paths.parameters()).unwrap()).unwrap();
        assert_eq!(parsed.dest_path, "/second");
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let dir = TempDir::new().unwrap();
        let paths = SessionPaths::new(dir.path());

        assert!(matches!(
            build_parameters(&paths, &[], "/dest", "u", "k"),
            Err(DescriptorError::MissingInput("src_paths"))
        ));
        assert!(matches!(
            build_parameters(&paths, &["/a".to_string()], "  ", "u", "k"),
            Err(DescriptorError::MissingInput("dest_path"))
        ));
        assert!(!paths.parameters().exists());
    }
}
