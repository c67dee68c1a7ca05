//! `dnswatch check` - Evaluate every record once.

use anyhow::Result;

use super::Context;
use crate::output::print_snapshot;

pub async fn execute(ctx: Context) -> Result<()> {
    let watcher = ctx.watcher()?;
    watcher.check_once().await;
    print_snapshot(ctx.output_format, &watcher.snapshot())
}
