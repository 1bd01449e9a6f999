use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a whole run.
///
/// Per-file and per-backend problems never show up here: they are folded into
/// an `EncodeOutcome` or a `false` capability result instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{tool} is not available: {reason}. Install it and add it to PATH")]
    EnvironmentUnavailable { tool: String, reason: String },

    #[error("Failed to create output directory {path}: {source}")]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
