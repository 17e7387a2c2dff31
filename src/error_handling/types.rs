use std::fmt;

use crate::session_management::SessionStatus;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    MissingValue(String),
    InvalidValue(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::MissingValue(e) => write!(f, "Missing configuration value: {}", e),
            ConfigError::InvalidValue(e) => write!(f, "Invalid configuration value: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum StorageError {
    AlreadyExists(String),
    NotFound(String),
    WriteFailed(String),
    ReadFailed(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::AlreadyExists(t) => write!(f, "Session {} already exists", t),
            StorageError::NotFound(t) => write!(f, "Session {} not found", t),
            StorageError::WriteFailed(e) => write!(f, "Storage write failed: {}", e),
            StorageError::ReadFailed(e) => write!(f, "Storage read failed: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum CredentialError {
    KeygenFailure(String),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::KeygenFailure(e) => write!(f, "Key generation failed: {}", e),
        }
    }
}

impl std::error::Error for CredentialError {}

#[derive(Debug)]
pub enum DescriptorError {
    MissingInput(&'static str),
    WriteFailed(std::io::Error),
    EncodeFailed(String),
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorError::MissingInput(field) => {
                write!(f, "Transfer descriptor input `{}` is empty", field)
            }
            DescriptorError::WriteFailed(e) => write!(f, "Transfer descriptor write failed: {}", e),
            DescriptorError::EncodeFailed(e) => {
                write!(f, "Transfer descriptor encoding failed: {}", e)
            }
        }
    }
}

impl std::error::Error for DescriptorError {}

impl From<std::io::Error> for DescriptorError {
    fn from(err: std::io::Error) -> Self {
        DescriptorError::WriteFailed(err)
    }
}

#[derive(Debug)]
pub enum RunnerError {
    LaunchFailure(String),
    LogFailed(std::io::Error),
    WaitFailed(std::io::Error),
    TimedOut(u64),
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::LaunchFailure(e) => write!(f, "External command could not start: {}", e),
            RunnerError::LogFailed(e) => write!(f, "Process log error: {}", e),
            RunnerError::WaitFailed(e) => write!(f, "Waiting for external command failed: {}", e),
            RunnerError::TimedOut(secs) => {
                write!(f, "External command killed after {} seconds", secs)
            }
        }
    }
}

impl std::error::Error for RunnerError {}

#[derive(Debug)]
pub enum SessionError {
    ValidationError(String),
    NotFound(String),
    AlreadyExists(String),
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
    KeygenFailure(String),
    LaunchFailure(String),
    TimedOut(u64),
    StorageError(StorageError),
    DescriptorError(DescriptorError),
    ProcessError(String),
    QueueClosed,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::ValidationError(e) => write!(f, "Validation error: {}", e),
            SessionError::NotFound(t) => write!(f, "Session {} not found", t),
            SessionError::AlreadyExists(t) => write!(f, "Session {} already exists", t),
            SessionError::InvalidTransition { from, to } => {
                write!(f, "Session cannot move from {} to {}", from, to)
            }
            SessionError::KeygenFailure(e) => write!(f, "Key generation failed: {}", e),
            SessionError::LaunchFailure(e) => write!(f, "Launch failure: {}", e),
            SessionError::TimedOut(secs) => {
                write!(f, "External command timed out after {} seconds", secs)
            }
            SessionError::StorageError(e) => write!(f, "Storage error: {}", e),
            SessionError::DescriptorError(e) => write!(f, "Descriptor error: {}", e),
            SessionError::ProcessError(e) => write!(f, "Process error: {}", e),
            SessionError::QueueClosed => write!(f, "Orchestration queue is closed"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(t) => SessionError::NotFound(t),
            StorageError::AlreadyExists(t) => SessionError::AlreadyExists(t),
            other => SessionError::StorageError(other),
        }
    }
}

impl From<CredentialError> for SessionError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::KeygenFailure(e) => SessionError::KeygenFailure(e),
        }
    }
}

impl From<DescriptorError> for SessionError {
    fn from(err: DescriptorError) -> Self {
        match err {
            DescriptorError::MissingInput(field) => {
                SessionError::ValidationError(format!("{} must not be empty", field))
            }
            other => SessionError::DescriptorError(other),
        }
    }
}

impl From<RunnerError> for SessionError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::LaunchFailure(e) => SessionError::LaunchFailure(e),
            RunnerError::TimedOut(secs) => SessionError::TimedOut(secs),
            other => SessionError::ProcessError(other.to_string()),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    InvalidAddress(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::InvalidAddress(e) => write!(f, "Invalid bind address: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    StorageError(StorageError),
    SessionError(SessionError),
    WebError(WebError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
            ControllerError::SessionError(e) => write!(f, "Session error: {}", e),
            ControllerError::WebError(e) => write!(f, "Web error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        ControllerError::StorageError(err)
    }
}

impl From<SessionError> for ControllerError {
    fn from(err: SessionError) -> Self {
        ControllerError::SessionError(err)
    }
}

impl From<WebError> for ControllerError {
    fn from(err: WebError) -> Self {
        ControllerError::WebError(err)
    }
}
