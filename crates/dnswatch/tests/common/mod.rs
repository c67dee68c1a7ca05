//! Shared fixtures for the end-to-end scenarios.

#![allow(dead_code)]

use async_trait::async_trait;
use dnswatch::{ProbeResult, Prober, TargetSpec, Verdict};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

pub const ZONE: &str = "example.com.";
pub const GROUP: &str = "web";
pub const NAME: &str = "www.example.com.";
pub const NEGATIVE: &str = "198.51.100.1";

/// Configuration with one zone, one dynamic group and a negative record.
/// `records` is the YAML list of dynamic records.
pub fn yaml_config(records: &str) -> String {
    format!(
        r#"
tick_ms: 20
zones:
  "{ZONE}":
    primary_name_server: ns1.example.com.
    email: hostmaster.example.com.
    dynamic_groups:
      {GROUP}:
        negative_records:
          - {{ name: {NAME}, type: a, ttl: 60, content: "{NEGATIVE}" }}
        dynamic_records:
{records}
"#
    )
}

/// Prober that sleeps, then answers alive, and records how many attempts
/// overlap
#[derive(Default)]
pub struct SlowProber {
    pub delay: Duration,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub calls: AtomicUsize,
}

impl SlowProber {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Prober for SlowProber {
    async fn attempt(&self, _spec: &TargetSpec, _deadline: Instant) -> ProbeResult<Verdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Verdict::Alive)
    }
}
