//! The probing capability and the protocol lookup table.

use async_trait::async_trait;
use dnswatch_core::{Protocol, TargetSpec};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::warn;

use crate::error::ProbeResult;
use crate::http::HttpProber;
use crate::icmp::IcmpProber;
use crate::regex_cache::RegexCache;
use crate::retry::probe_with_retry;
use crate::tcp::TcpProber;

/// Outcome of one attempt that reached the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Target answered as expected
    Alive,
    /// Target answered, but not with an accepted status or content.
    /// Authoritative: retrying within the same cycle would not change it.
    Mismatch(String),
}

impl Verdict {
    /// Returns true for [`Verdict::Alive`]
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        matches!(self, Self::Alive)
    }
}

/// One probing protocol.
///
/// Implementations perform a single attempt and must finish by `deadline`;
/// the retry loop also cancels attempts that overrun it.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Perform one attempt against the target
    async fn attempt(&self, spec: &TargetSpec, deadline: Instant) -> ProbeResult<Verdict>;

    /// Probe the target under its retry budget
    async fn is_alive(&self, spec: &TargetSpec) -> bool {
        probe_with_retry(self, spec).await
    }
}

/// Probers keyed by declared protocol
#[derive(Clone, Default)]
pub struct ProberSet {
    probers: HashMap<Protocol, Arc<dyn Prober>>,
}

impl ProberSet {
    /// A table with no probers; every target probes dead
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// ICMP, TCP and HTTP probers sharing one regex cache
    pub fn standard() -> ProbeResult<Self> {
        let regex = Arc::new(RegexCache::new());
        let tcp: Arc<dyn Prober> = Arc::new(TcpProber::new(Arc::clone(&regex)));
        let http: Arc<dyn Prober> = Arc::new(HttpProber::new(regex)?);
        Ok(Self::empty()
            .with(Protocol::Icmp, Arc::new(IcmpProber::new()))
            .with(Protocol::Tcp, Arc::clone(&tcp))
            .with(Protocol::TcpRegex, tcp)
            .with(Protocol::Http, Arc::clone(&http))
            .with(Protocol::HttpRegex, http))
    }

    /// Register or replace the prober for a protocol
    #[must_use]
    pub fn with(mut self, protocol: Protocol, prober: Arc<dyn Prober>) -> Self {
        self.probers.insert(protocol, prober);
        self
    }

    /// Prober registered for a protocol
    #[must_use]
    pub fn get(&self, protocol: Protocol) -> Option<&Arc<dyn Prober>> {
        self.probers.get(&protocol)
    }

    /// Probe a target with the prober for its protocol.
    ///
    /// A protocol without a prober is dead.
    pub async fn is_alive(&self, spec: &TargetSpec) -> bool {
        match self.get(spec.protocol) {
            Some(prober) => prober.is_alive(spec).await,
            None => {
                warn!(
                    target_name = %spec.name,
                    protocol = %spec.protocol,
                    "no prober for protocol, target is dead"
                );
                false
            }
        }
    }
}

impl fmt::Debug for ProberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut protocols: Vec<&str> = self.probers.keys().map(|p| p.as_str()).collect();
        protocols.sort_unstable();
        f.debug_struct("ProberSet")
            .field("protocols", &protocols)
            .finish()
    }
}
