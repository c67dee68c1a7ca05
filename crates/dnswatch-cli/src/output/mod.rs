//! Output formatting for different formats.

use clap::ValueEnum;
use colored::Colorize;
use dnswatch::WatchSnapshot;
use serde::{Deserialize, Serialize};

/// Available output formats.
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Colored tables
    #[default]
    Pretty,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

/// Print a serializable value as JSON or YAML.
///
/// Returns `false` for [`OutputFormat::Pretty`], leaving the caller to
/// render it.
pub fn print_structured<T: Serialize>(format: OutputFormat, value: &T) -> anyhow::Result<bool> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Pretty => return Ok(false),
    }
    Ok(true)
}

/// Colored alive/dead marker
pub fn state_label(alive: bool) -> String {
    if alive {
        "ALIVE".green().bold().to_string()
    } else {
        "DEAD".red().bold().to_string()
    }
}

/// Print a snapshot in the requested format
pub fn print_snapshot(format: OutputFormat, snapshot: &WatchSnapshot) -> anyhow::Result<()> {
    if print_structured(format, snapshot)? {
        return Ok(());
    }

    for (name, zone) in &snapshot.zones {
        println!("{} {}", "Zone".bold(), name.cyan().bold());
        if !zone.primary_name_server.is_empty() {
            println!("  SOA {} {}", zone.primary_name_server, zone.email);
        }
        for record in zone.name_servers.iter().chain(&zone.static_records) {
            println!(
                "  {:<6} {:<32} {:>6} {}",
                record.record_type, record.name, record.ttl, record.content
            );
        }
        for record in &zone.dynamic_records {
            let group = if record.negative {
                format!("{} (negative)", record.group)
            } else {
                record.group.clone()
            };
            println!(
                "  {:<6} {:<32} {:>6} {:<20} {:<5} {}",
                record.record_type,
                record.name,
                record.ttl,
                record.content,
                state_label(record.alive),
                group.dimmed()
            );
        }
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_is_left_to_caller() {
        let value = serde_json::json!({ "alive": true });
        assert!(!print_structured(OutputFormat::Pretty, &value).unwrap());
        assert!(print_structured(OutputFormat::Json, &value).unwrap());
    }
}
