//! Unified error type hierarchy for Prebuilt Matrix
//!
//! Provides structured error handling with ConfigError, RecipeError, BuildError,
//! and the top-level AppError used by the binary.

use std::io;
use thiserror::Error;

/// Configuration file parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid TOML in config: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("Invalid JSON in config: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("Build matrix is empty: at least one version is required")]
    EmptyMatrix,

    #[error("Invalid version identifier '{0}': must match [A-Za-z0-9][A-Za-z0-9._-]*")]
    InvalidVersion(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Recipe template rendering and materialization errors.
#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("Recipe template has no '{0}' placeholder")]
    MissingPlaceholder(&'static str),

    #[error("Recipe template not found: {0}")]
    TemplateNotFound(String),

    #[error("IO error during recipe operations: {0}")]
    IoError(#[from] io::Error),
}

/// Container build and run errors. Every variant is fatal to the run.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Failed to spawn '{cmd}': {reason}")]
    SpawnFailed { cmd: String, reason: String },

    #[error("Command '{cmd}' failed: {status}")]
    CommandFailed { cmd: String, status: String },

    #[error("Build cancelled by user")]
    Cancelled,

    #[error("Recipe error: {0}")]
    Recipe(#[from] RecipeError),

    #[error("IO error during build: {0}")]
    IoError(#[from] io::Error),
}

/// Global error type returned to `main`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Recipe(#[from] RecipeError),

    #[error(transparent)]
    Build(#[from] BuildError),

    /// Logging pipeline could not be set up
    #[error("Logging initialization failed: {0}")]
    Logging(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl AppError {
    /// Get a user-facing error message suitable for terminal output
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(e) => format!("Configuration error: {}", e),
            AppError::Recipe(e) => format!("Recipe error: {}", e),
            AppError::Build(BuildError::SpawnFailed { cmd, reason }) => {
                format!("Could not run '{}' (is it installed and on PATH?): {}", cmd, reason)
            }
            AppError::Build(e) => format!("Build failed: {}", e),
            AppError::Logging(msg) => format!("Failed to initialize logging: {}", msg),
            AppError::Io(msg) => format!("File operation failed: {}", msg),
        }
    }
}

impl From<io::Error> for AppError {
    fn from(e: io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

/// Top-level result type for operations surfaced to the binary.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::FileNotFound("/etc/matrix.toml".to_string());
        assert_eq!(err.to_string(), "Configuration file not found: /etc/matrix.toml");
    }

    #[test]
    fn test_command_failed_display() {
        let err = BuildError::CommandFailed {
            cmd: "docker build".to_string(),
            status: "exit code 1".to_string(),
        };
        assert_eq!(err.to_string(), "Command 'docker build' failed: exit code 1");
    }

    #[test]
    fn test_spawn_failure_user_message_mentions_path() {
        let err: AppError = BuildError::SpawnFailed {
            cmd: "docker".to_string(),
            reason: "No such file or directory".to_string(),
        }
        .into();
        assert!(err.user_message().contains("PATH"));
    }

    #[test]
    fn test_result_type_err() {
        let result: Result<i32> = Err(ConfigError::EmptyMatrix.into());
        assert!(result.is_err());
    }
}
