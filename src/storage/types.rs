use std::path::{Path, PathBuf};

pub const META_FILE: &str = "meta.json";
pub const PRIVATE_KEY_FILE: &str = "id_ed25519";
pub const PUBLIC_KEY_FILE: &str = "id_ed25519.pub";
pub const INVENTORY_FILE: &str = "inventory.ini";
pub const PARAMETERS_FILE: &str = "vars.json";
pub const TRANSFER_LOG_FILE: &str = "transfer.log";
pub const CLEANUP_LOG_FILE: &str = "cleanup.log";
pub const REPORT_FILE: &str = "report.json";

/// Fixed layout of one session directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    root: PathBuf,
}

impl SessionPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> PathBuf {
        self.root.join(META_FILE)
    }

    pub fn private_key(&self) -> PathBuf {
        self.root.join(PRIVATE_KEY_FILE)
    }

    pub fn public_key(&self) -> PathBuf {
        self.root.join(PUBLIC_KEY_FILE)
    }

    pub fn inventory(&self) -> PathBuf {
        self.root.join(INVENTORY_FILE)
    }

    pub fn parameters(&self) -> PathBuf {
        self.root.join(PARAMETERS_FILE)
    }

    pub fn transfer_log(&self) -> PathBuf {
        self.root.join(TRANSFER_LOG_FILE)
    }

    pub fn cleanup_log(&self) -> PathBuf {
        self.root.join(CLEANUP_LOG_FILE)
    }

    pub fn report(&self) -> PathBuf {
        self.root.join(REPORT_FILE)
    }
}
