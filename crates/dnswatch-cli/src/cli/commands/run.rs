//! `dnswatch run` - Watch until interrupted.

use anyhow::Result;
use colored::Colorize;
use tracing::info;

use super::Context;
use crate::output::{print_snapshot, OutputFormat};

pub async fn execute(ctx: Context) -> Result<()> {
    let watcher = ctx.watcher()?;
    watcher.start()?;

    if ctx.output_format == OutputFormat::Pretty {
        eprintln!(
            "{} {} records every {:?} tick, Ctrl-C to stop",
            "Watching".green().bold(),
            watcher.state().record_count(),
            watcher.tick()
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, waiting for in-flight cycles");
    watcher.stop().await;
    watcher.wait_idle().await;

    print_snapshot(ctx.output_format, &watcher.snapshot())
}
