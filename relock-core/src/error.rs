use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelockError {
    #[error("Cannot use project directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Project path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("Failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed with exit code {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelockError>;
