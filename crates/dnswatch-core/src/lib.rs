//! Core types for the dnswatch liveness watcher.
//!
//! This crate holds everything the watcher shares between its moving parts:
//!
//! - **Types**: targets, dynamic records, negative records, zones and the
//!   [`WatchState`] that owns them for the lifetime of the process
//! - **Rules**: the boolean rule language (`%(a) && !%(b)`) turned into a
//!   typed [`RuleExpr`] and evaluated fail-closed
//! - **Snapshots**: the read-only [`WatchSnapshot`] consumed by the HTTP
//!   read model
//! - **Errors**: [`WatchError`] and [`RuleError`]
//!
//! # Example
//!
//! ```rust,ignore
//! use dnswatch_core::{Protocol, Record, TargetSpec};
//!
//! let record = Record::builder("www.example.com.", "A", "192.0.2.10")
//!     .target(TargetSpec::new("web", Protocol::Http, "http://192.0.2.10/"))
//!     .rule("%(web)")
//!     .build();
//!
//! assert!(!record.alive());
//! ```

#![doc(html_root_url = "https://docs.rs/dnswatch-core/0.3.0")]

mod error;
pub mod rule;
pub mod types;

pub use error::{Result, WatchError};
pub use rule::{RuleError, RuleExpr};
pub use types::*;
