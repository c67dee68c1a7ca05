//! `dnswatch validate` - Check a configuration file.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use super::Context;
use crate::output::print_structured;

#[derive(Debug, Serialize)]
struct Summary {
    config: String,
    tick_ms: u64,
    zones: usize,
    dynamic_records: usize,
    negative_records: usize,
    targets: usize,
    /// Records whose rule does not parse; they are watched but always dead
    broken_rules: Vec<String>,
}

pub fn execute(ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?;
    let state = config.build_state();

    let broken_rules = state
        .records()
        .filter_map(|record| {
            record.rule().err().map(|e| {
                format!(
                    "{} {} {} {}: {}",
                    record.zone(),
                    record.name(),
                    record.record_type(),
                    record.content(),
                    e
                )
            })
        })
        .collect();
    let summary = Summary {
        config: ctx.config.display().to_string(),
        tick_ms: config.tick_ms,
        zones: state.zones().count(),
        dynamic_records: state.record_count(),
        negative_records: state
            .zones()
            .flat_map(|z| z.dynamic_groups.values())
            .map(|g| g.negative_records.len())
            .sum(),
        targets: state.records().map(|r| r.targets().len()).sum(),
        broken_rules,
    };

    if print_structured(ctx.output_format, &summary)? {
        return Ok(());
    }

    println!("{} {}", "Valid:".green().bold(), summary.config);
    println!("  tick            {} ms", summary.tick_ms);
    println!("  zones           {}", summary.zones);
    println!("  dynamic records {}", summary.dynamic_records);
    println!("  negative records {}", summary.negative_records);
    println!("  targets         {}", summary.targets);
    for broken in &summary.broken_rules {
        println!("  {} {}", "broken rule:".yellow().bold(), broken);
    }
    Ok(())
}
