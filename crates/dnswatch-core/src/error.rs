use thiserror::Error;

/// Result type alias for watcher state operations
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors raised when reading or administering the watch state
#[derive(Error, Debug)]
pub enum WatchError {
    /// Zone is not part of the loaded configuration
    #[error("unknown zone: {0}")]
    UnknownZone(String),

    /// No dynamic record matched the given identity
    #[error("dynamic record not found: {name} {record_type} {content} in zone {zone}")]
    RecordNotFound {
        /// Zone that was searched
        zone: String,
        /// Record owner name
        name: String,
        /// Record type
        record_type: String,
        /// Record content
        content: String,
    },
}
