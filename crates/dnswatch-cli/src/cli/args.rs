//! Command-line argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Liveness watcher for DNS failover
///
/// Probes the ICMP, TCP and HTTP targets behind every dynamic record,
/// evaluates each record's rule and reports which records are alive.
#[derive(Parser, Debug)]
#[command(name = "dnswatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (.toml, .json, .yaml or .yml)
    #[arg(
        short,
        long,
        env = "DNSWATCH_CONFIG",
        global = true,
        default_value = "dnswatch.toml"
    )]
    pub config: PathBuf,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch until Ctrl-C, then print the final state
    Run,

    /// Evaluate every record once and print the result
    Check,

    /// Evaluate a rule expression against target values
    Eval(EvalArgs),

    /// Validate the configuration file
    Validate,
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Rule expression, e.g. '%(web) && !%(maint)'
    pub rule: String,

    /// Target values as NAME=true|false (also up/down, alive/dead, 1/0)
    #[arg(value_parser = parse_assignment)]
    pub values: Vec<(String, bool)>,
}

fn parse_assignment(s: &str) -> Result<(String, bool), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {s:?}"))?;
    if name.is_empty() {
        return Err(format!("missing target name in {s:?}"));
    }
    let value = match value.to_ascii_lowercase().as_str() {
        "true" | "up" | "alive" | "1" => true,
        "false" | "down" | "dead" | "0" => false,
        other => return Err(format!("{other:?} is not a boolean")),
    };
    Ok((name.to_string(), value))
}
