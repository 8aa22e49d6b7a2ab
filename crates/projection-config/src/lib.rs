//! # Projection Configuration
//!
//! Input side of the homelab projector.
//!
//! This crate loads docker-compose style service manifests into
//! [`ServiceSpec`] values, parses compose port strings into [`PortBinding`]s,
//! and reads the projector settings file (network table, drop-in rules,
//! template slot tables, external build command).

#![warn(missing_docs)]

use std::path::PathBuf;
use thiserror::Error;

pub mod manifest;
pub mod port;
pub mod resolver;
pub mod settings;

pub use manifest::{
    ServiceSpec, Services, load_manifest, load_manifest_dir, merge_services, parse_manifest_str,
};
pub use port::{LOOPBACK_ADDRESS, PortBinding, Protocol, parse_port};
pub use resolver::{EnvContext, resolve_env_vars};
pub use settings::{
    BuildSettings, DropInRule, NetworkSettings, NetworkTarget, SETTINGS_FILE, Settings, SlotPath,
    SlotSettings, SlotTable, load_settings, parse_settings_str,
};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Manifest file missing or unreadable
    #[error("Failed to read manifest {}: {source}", path.display())]
    ManifestRead {
        /// Manifest path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Manifest content is not valid YAML or lacks a `services` mapping
    #[error("Failed to parse manifest {}: {source}", path.display())]
    ManifestParse {
        /// Manifest path
        path: PathBuf,
        /// Underlying YAML error
        source: serde_yaml::Error,
    },

    /// A manifest directory contained no manifest files
    #[error("No manifest files found in {}", .0.display())]
    NoManifests(PathBuf),

    /// A port entry could not be understood
    #[error("Invalid port mapping '{port}' for service '{service}'")]
    InvalidPort {
        /// Owning service
        service: String,
        /// The offending entry
        port: String,
    },

    /// Failed to read the settings file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Environment variable not found
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    /// Network not present in the network table
    #[error("Unknown network '{0}'")]
    UnknownNetwork(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
