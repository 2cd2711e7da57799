//! Plugin Error Types

use thiserror::Error;

/// Errors that can occur in the plugin core
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Plugin not prepared - call prepare() first")]
    NotPrepared,

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Invalid plugin state: {0}")]
    InvalidState(#[from] serde_json::Error),

    #[error("Failed to spawn control thread: {0}")]
    ThreadSpawnError(String),

    #[error("DSP error: {0}")]
    DspError(#[from] trieq_dsp::DspError),
}

/// Result type alias for plugin operations
pub type PluginResult<T> = Result<T, PluginError>;
