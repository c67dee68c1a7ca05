//! Command implementations.

pub mod check;
pub mod eval;
pub mod run;
pub mod validate;

use anyhow::Result;
use dnswatch::{Watcher, WatcherConfig};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Configuration file
    pub config: PathBuf,

    /// Output format
    pub output_format: OutputFormat,
}

impl Context {
    /// Load and validate the configuration file.
    pub fn load_config(&self) -> Result<WatcherConfig> {
        let config = WatcherConfig::load(&self.config)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a watcher from the configuration file.
    pub fn watcher(&self) -> Result<Watcher> {
        let config = WatcherConfig::load(&self.config)?;
        Ok(Watcher::from_config(&config)?)
    }
}
