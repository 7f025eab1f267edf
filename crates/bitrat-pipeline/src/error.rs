//! Pipeline errors.

use thiserror::Error;

use bitrat_core::ConfigError;

/// Fatal errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid configuration detected before any stage started.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Writing to the output destination failed.
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),

    /// The binary record set could not be encoded or decoded.
    #[error("failed to encode result set: {0}")]
    Encode(#[from] postcard::Error),

    /// The JSON record set could not be encoded.
    #[error("failed to encode result set: {0}")]
    Json(#[from] serde_json::Error),

    /// A stage thread could not be started.
    #[error("cannot start {stage} thread: {source}")]
    Spawn {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A stage thread panicked.
    #[error("{stage} stage panicked")]
    StagePanicked { stage: &'static str },
}
