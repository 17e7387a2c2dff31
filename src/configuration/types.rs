use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// An external program plus the leading arguments it is always given.
///
/// Call sites append their own arguments after `args`, which lets an operator
/// wrap a tool (`sudo -u deploy ansible-playbook`, a virtualenv shim, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Externally reachable base URL used in share and accept links.
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            public_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub sessions_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sessions_dir: PathBuf::from("sessions"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionsConfig {
    pub default_dest_path: String,
    pub log_tail_lines: usize,
    pub resume_cleanup_on_start: bool,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            default_dest_path: "/home/ubuntu/received_files".to_string(),
            log_tail_lines: 200,
            resume_cleanup_on_start: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeygenConfig {
    pub command: ExternalCommand,
}

impl Default for KeygenConfig {
    fn default() -> Self {
        Self {
            command: ExternalCommand::new("ssh-keygen"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutomationConfig {
    pub command: ExternalCommand,
    pub transfer_playbook: PathBuf,
    pub cleanup_playbook: PathBuf,
    /// Seconds before a hung playbook is killed; `0` waits forever.
    pub timeout_secs: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            command: ExternalCommand::new("ansible-playbook"),
            transfer_playbook: PathBuf::from("playbooks/transfer.yml"),
            cleanup_playbook: PathBuf::from("playbooks/cleanup.yml"),
            timeout_secs: 0,
        }
    }
}
