//! dnswatch - liveness watcher for DNS failover
//!
//! Probes the targets behind every dynamic record and publishes which
//! records are alive.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    dnswatch_cli::run().await
}
