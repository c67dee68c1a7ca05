use std::time::Duration;
use thiserror::Error;

/// Result type alias for a single probe attempt
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

/// Errors from a single probe attempt
#[derive(Error, Debug)]
pub enum ProbeError {
    /// TCP connect failed
    #[error("connect to {dest} failed: {source}")]
    Connect {
        /// Destination that was dialed
        dest: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Reading the response failed
    #[error("read from {dest} failed: {reason}")]
    Read {
        /// Destination that was read from
        dest: String,
        /// Failure description
        reason: String,
    },

    /// Raw socket could not be opened or used
    #[error("raw socket error: {0}")]
    Socket(String),

    /// Destination host did not resolve
    #[error("cannot resolve {0}")]
    Resolve(String),

    /// HTTP request failed before a response arrived
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Attempt exceeded its deadline
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// Content or status pattern failed to compile
    #[error("invalid pattern {pattern:?}: {source}")]
    Regex {
        /// Pattern text
        pattern: String,
        /// Compiler error
        #[source]
        source: regex::Error,
    },

    /// Content-matching protocol without a pattern
    #[error("target {0} requires a regex")]
    MissingPattern(String),

    /// Destination is not usable for the protocol
    #[error("invalid destination {dest:?}: {reason}")]
    InvalidDestination {
        /// Configured destination
        dest: String,
        /// What is wrong with it
        reason: String,
    },

    /// HTTP method is not a valid token
    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    /// Other I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Returns true if another attempt could succeed.
    ///
    /// Configuration faults are permanent for the lifetime of the process;
    /// network and socket faults are not.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        !matches!(
            self,
            Self::Regex { .. }
                | Self::MissingPattern(_)
                | Self::InvalidDestination { .. }
                | Self::InvalidMethod(_)
        )
    }
}
