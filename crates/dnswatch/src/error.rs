use std::path::PathBuf;
use thiserror::Error;

use dnswatch_core::WatchError;
use dnswatch_probe::ProbeError;

/// Result type alias for watcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from the watcher facade
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration could not be loaded or is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Watch state lookup or administration failed
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Probers could not be set up
    #[error("prober setup failed: {0}")]
    Probe(#[from] ProbeError),

    /// `start` called on a running watcher
    #[error("watcher is already running")]
    AlreadyRunning,
}

/// Errors from loading and validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Configuration file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Extension does not name a supported format
    #[error("unsupported configuration format: {0} (expected .toml, .json, .yaml or .yml)")]
    UnsupportedFormat(PathBuf),

    /// File content does not deserialize
    #[error("cannot parse {format} configuration: {reason}")]
    Parse {
        /// Format that was parsed
        format: &'static str,
        /// Parser message
        reason: String,
    },

    /// Structurally complete but semantically invalid
    #[error("invalid configuration:\n  {}", .0.join("\n  "))]
    Invalid(Vec<String>),
}
