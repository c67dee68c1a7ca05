//! # dnswatch-cli
//!
//! Command-line runner for the dnswatch liveness watcher.
//!
//! ## Commands
//!
//! - **run**: start the watcher until Ctrl-C, then print the final state
//! - **check**: evaluate every record once and print the result
//! - **eval**: try a rule expression against given target values
//! - **validate**: load and validate a configuration file
//!
//! Results print as colored tables, JSON or YAML (`--output`).

pub mod cli;
pub mod output;

pub use cli::run;
