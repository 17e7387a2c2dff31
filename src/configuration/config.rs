use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::Parser;
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command-line arguments of the `handoff` binary.
///
/// Every flag is optional: without `--config` the built-in defaults are used,
/// and the remaining flags override whatever the file says.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "handoff")]
#[command(version)]
#[command(about = "One-time, key-scoped file transfers driven by an automation tool")]
pub struct CommandLine {
    /// Path to the TOML configuration file
    ///
    /// # Command Line
    /// Use `--config <FILE>` or set `HANDOFF_CONFIG`
    #[arg(long, short, env = "HANDOFF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address the web interface binds to
    #[arg(long)]
    pub bind_address: Option<String>,

    /// Port the web interface listens on
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory holding one sub-directory per session
    #[arg(long)]
    pub sessions_dir: Option<PathBuf>,
}

/// Application configuration, loaded once and handed to every component.
///
/// # Fields Overview
///
/// - `server`: bind address, port and the public base URL for links
/// - `storage`: where session directories live
/// - `sessions`: default destination, status log tail length, startup recovery
/// - `keygen`: the key-generation tool
/// - `automation`: the automation tool, its two playbooks and the kill timeout
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub sessions: SessionsConfig,
    pub keygen: KeygenConfig,
    pub automation: AutomationConfig,
}

impl Config {
    /// Reads and validates a TOML configuration file.
    ///
    /// Relative paths inside the file are resolved against the file's directory.
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        info!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Self::parse(&content, base)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses TOML content, resolving relative paths against `base`.
    pub fn parse(content: &str, base: &Path) -> Result<Config, ConfigError> {
        let mut config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.resolve_relative_paths(base);
        Ok(config)
    }

    /// Builds the effective configuration from the command line.
    pub fn load(cli: &CommandLine) -> Result<Config, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => {
                info!("No configuration file given, using defaults");
                Config::default()
            }
        };
        config.apply_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, cli: &CommandLine) {
        if let Some(bind_address) = &cli.bind_address {
            debug!("Overriding bind address with {}", bind_address);
            self.server.bind_address = bind_address.clone();
        }
        if let Some(port) = cli.port {
            debug!("Overriding port with {}", port);
            self.server.port = port;
        }
        if let Some(dir) = &cli.sessions_dir {
            debug!("Overriding sessions dir with {}", dir.display());
            self.storage.sessions_dir = dir.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::MissingValue("server.bind_address".into()));
        }
        if let Some(url) = &self.server.public_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue(format!(
                    "server.public_url must start with http:// or https://, got {}",
                    url
                )));
            }
        }
        if self.storage.sessions_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingValue("storage.sessions_dir".into()));
        }
        if self.sessions.default_dest_path.trim().is_empty() {
            return Err(ConfigError::MissingValue(
                "sessions.default_dest_path".into(),
            ));
        }
        if self.sessions.log_tail_lines == 0 {
            return Err(ConfigError::NotInRange(
                "sessions.log_tail_lines must be at least 1".into(),
            ));
        }
        if self.keygen.command.program.trim().is_empty() {
            return Err(ConfigError::MissingValue("keygen.command.program".into()));
        }
        if self.automation.command.program.trim().is_empty() {
            return Err(ConfigError::MissingValue(
                "automation.command.program".into(),
            ));
        }
        if self.automation.transfer_playbook.as_os_str().is_empty() {
            return Err(ConfigError::MissingValue(
                "automation.transfer_playbook".into(),
            ));
        }
        if self.automation.cleanup_playbook.as_os_str().is_empty() {
            return Err(ConfigError::MissingValue(
                "automation.cleanup_playbook".into(),
            ));
        }
        Ok(())
    }

    /// Base URL for links handed to operators and clients, without a trailing slash.
    pub fn public_url(&self) -> String {
        match &self.server.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let host = match self.server.bind_address.as_str() {
                    "0.0.0.0" | "::" => "localhost",
                    other => other,
                };
                format!("http://{}:{}", host, self.server.port)
            }
        }
    }

    pub fn automation_timeout(&self) -> Option<Duration> {
        match self.automation.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    fn resolve_relative_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() && !p.as_os_str().is_empty() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.storage.sessions_dir);
        resolve(&mut self.automation.transfer_playbook);
        resolve(&mut self.automation.cleanup_playbook);
    }
}
