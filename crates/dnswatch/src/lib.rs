//! Liveness watcher driving DNS failover.
//!
//! The watcher probes every target of every dynamic record, turns the
//! per-target results into a record verdict with the record's rule, and
//! publishes the verdict for the DNS read model.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use dnswatch::{Watcher, WatcherConfig};
//!
//! #[tokio::main]
//! async fn main() -> dnswatch::Result<()> {
//!     let config = WatcherConfig::load("dnswatch.toml")?;
//!     let watcher = Watcher::from_config(&config)?;
//!
//!     watcher.start()?;
//!     tokio::time::sleep(std::time::Duration::from_secs(30)).await;
//!     watcher.stop().await;
//!
//!     let snapshot = watcher.snapshot();
//!     println!("{}", serde_json::to_string_pretty(&snapshot).unwrap());
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `default` - Uses rustls for TLS
//! - `rustls` - Use rustls for the HTTP prober
//! - `native-tls` - Use system native TLS for the HTTP prober

#![doc(html_root_url = "https://docs.rs/dnswatch/0.3.0")]

pub mod config;
mod cycle;
mod dispatch;
mod error;
pub mod notifier;
mod scheduler;

pub use config::{ConfigFormat, WatcherConfig};
pub use cycle::{evaluate_claimed, try_evaluate, CycleOutcome};
pub use dispatch::dispatch;
pub use error::{ConfigError, Error, Result};
pub use notifier::{ChannelNotifier, LogNotifier, Notifier, NotifierConfig};
pub use scheduler::{Watcher, WatcherBuilder};

// Re-export core types and probers
pub use dnswatch_core::*;
pub use dnswatch_probe as probe;
pub use dnswatch_probe::{ProbeError, ProbeResult, Prober, ProberSet, Verdict};
