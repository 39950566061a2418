// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellwireError {
    /// No executable could be found for the logical name, either before
    /// spawning or because the child exited with 127.
    #[error("command not found: {name}")]
    Resolution { name: String },

    /// Nonzero exit while the session's fail-on-nonzero policy is active.
    #[error("command {argv:?} failed with exit code {code}")]
    ExecutionFailure { argv: Vec<String>, code: i32 },

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("System call failed: {0}")]
    Sys(#[from] nix::errno::Errno),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShellwireError {
    /// Exit code carried by an `ExecutionFailure`, if this is one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ShellwireError::ExecutionFailure { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ShellwireError>;
