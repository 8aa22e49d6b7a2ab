//! Error types for projection runs

use projection_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Projection error type
#[derive(Error, Debug)]
pub enum ProjectionError {
    /// Manifest or settings problem
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A template or drop-in lacks the structure the builder writes into
    #[error("Unexpected template shape in {document}: {reason}")]
    TemplateShape {
        /// Template or drop-in being processed
        document: String,
        /// What was missing
        reason: String,
    },

    /// Failed to read an input document
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// File being read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Failed to write an artifact
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        /// Artifact being written
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Input document is not valid JSON
    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        /// Offending document
        path: PathBuf,
        /// Underlying JSON error
        source: serde_json::Error,
    },

    /// Failed to serialize a payload
    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The external build command could not be started
    #[error("Failed to run '{command}': {source}")]
    BuildSpawn {
        /// Program that failed to start
        command: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The external build command exited unsuccessfully
    #[error("External build '{command}' failed with {status}:\n{output}")]
    BuildFailed {
        /// Full command line
        command: String,
        /// Exit status description
        status: String,
        /// Captured stdout and stderr
        output: String,
    },

    /// DNS records requested for a network without a proxy address
    #[error("Network '{0}' has no proxy address configured")]
    MissingProxyAddress(String),
}

impl ProjectionError {
    /// Create a template shape error
    pub fn template_shape(document: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TemplateShape {
            document: document.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ProjectionError>;
