//! Error types for the Ember speech worker

use std::time::Duration;

use thiserror::Error;

/// Result type alias for Ember operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Ember speech worker
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed command or response on the wire
    #[error("protocol error: {0}")]
    Protocol(String),

    /// External inference tool failed, timed out, or could not be spawned
    #[error("invocation error: {0}")]
    Invocation(String),

    /// Worker pipes closed unexpectedly or the process died
    #[error("transport error: {0}")]
    Transport(String),

    /// Worker never printed its readiness marker
    #[error("worker did not become ready within {0:?}")]
    StartupTimeout(Duration),

    /// Audio encoding or WAV file error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
