//! Error types for netcore

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetcoreError {
    /// Driver lacks the requested capability
    #[error("Not supported: {0}")]
    NotSupported(String),
    /// An equivalent asynchronous operation is outstanding
    #[error("Already in progress: {0}")]
    AlreadyInProgress(String),
    /// Requested state already holds
    #[error("Already done: {0}")]
    AlreadyDone(String),
    /// Kill-switch or offline policy forbids the operation
    #[error("Link blocked: {0}")]
    LinkBlocked(String),
    /// Lookup by id or index found nothing
    #[error("No such entity: {0}")]
    NoSuchEntity(String),
    /// Malformed request
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Allocation failure
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
    /// Command execution failed
    #[error("Command '{cmd}' failed{}: {stderr}", .code.map(|c| format!(" with code {}", c)).unwrap_or_default())]
    CommandFailed { cmd: String, code: Option<i32>, stderr: String },
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
    /// Daemon task or channel unavailable
    #[error("Service error: {0}")]
    ServiceError(String),
}

impl NetcoreError {
    /// `AlreadyDone` and `AlreadyInProgress` are expected outcomes of
    /// idempotent requests and are not worth surfacing as failures.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            NetcoreError::AlreadyDone(_) | NetcoreError::AlreadyInProgress(_)
        )
    }
}

impl From<serde_json::Error> for NetcoreError {
    fn from(error: serde_json::Error) -> Self {
        NetcoreError::Parse(error.to_string())
    }
}

impl From<toml::de::Error> for NetcoreError {
    fn from(error: toml::de::Error) -> Self {
        NetcoreError::Parse(error.to_string())
    }
}

pub type NetcoreResult<T> = Result<T, NetcoreError>;
