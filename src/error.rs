use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    StdIoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] anyhow::Error),

    // Initial cwd lookup failed. Logged only, never shown in a tab.
    #[error("Directory resolution failed: {0}")]
    DirectoryResolution(String),

    #[error("{0}")]
    DirectoryChange(String),

    #[error("{0}")]
    ProcessSpawn(String),

    #[error("Session not found for ID: {0}")]
    SessionNotFound(String),

    #[error("Invalid input argument: {0}")]
    InvalidInputArgument(String),
}

impl AppError {
    /// Human-readable detail without the variant's prefix, for output lines.
    pub fn detail(&self) -> String {
        match self {
            AppError::DirectoryChange(detail) | AppError::ProcessSpawn(detail) => detail.clone(),
            other => other.to_string(),
        }
    }
}
