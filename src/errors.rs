// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Everything that can go wrong *before* a child process is running is
//! reported synchronously through [`TaskrelayError`]. Once a child runs, its
//! failures are only visible as an exit code (or as silence on the result
//! channel).

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskrelayError {
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Launch error for task '{task}': {reason}")]
    Launch { task: String, reason: String },

    #[error("Task already active: {0}")]
    DuplicateTask(String),

    #[error("Cannot bind result channel on {addr}: {source}")]
    ChannelBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskrelayError>;
