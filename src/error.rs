use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DepsError {
    #[error("Failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Dependency '{name}' not found in {}", path.display())]
    DependencyNotFound { path: PathBuf, name: String },

    #[error("`{command}` failed in {} ({status}): {stderr}", dir.display())]
    NativeTool {
        command: String,
        dir: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("No usable version found for '{name}': {reason}")]
    OracleLookup { name: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to access {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DepsError {
    pub fn parse(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        DepsError::Parse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DepsError::FileAccess {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DepsError>;
