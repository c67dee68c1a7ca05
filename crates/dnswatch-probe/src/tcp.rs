//! TCP connect probe, optionally matching the first bytes received.

use async_trait::async_trait;
use dnswatch_core::TargetSpec;
use regex::bytes::Regex;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{ProbeError, ProbeResult};
use crate::prober::{Prober, Verdict};
use crate::regex_cache::RegexCache;

/// Bytes inspected by `tcp-regex` when the target sets no `res_size`
pub const DEFAULT_TCP_RES_SIZE: usize = 1024;

/// Largest single read from the socket
const READ_CHUNK: usize = 4096;

/// Upper bound on the buffer reserved before any byte arrives
const INITIAL_CAPACITY: usize = 64 * 1024;

/// Prober for `tcp` and `tcp-regex` targets.
///
/// `dest` is `host:port`. In content mode the prober reads until the
/// pattern matches, the peer closes, `res_size` bytes have arrived or the
/// deadline passes, whichever comes first.
#[derive(Debug, Clone)]
pub struct TcpProber {
    regex: Arc<RegexCache>,
}

impl TcpProber {
    /// Create a prober compiling patterns through `regex`
    #[must_use]
    pub const fn new(regex: Arc<RegexCache>) -> Self {
        Self { regex }
    }

    fn pattern(&self, spec: &TargetSpec) -> ProbeResult<Option<Arc<Regex>>> {
        if !spec.protocol.matches_content() {
            return Ok(None);
        }
        let pattern = spec
            .regex
            .as_deref()
            .ok_or_else(|| ProbeError::MissingPattern(spec.name.clone()))?;
        self.regex
            .get(pattern, spec.regex_flags)
            .map(Some)
            .map_err(|source| ProbeError::Regex {
                pattern: pattern.to_string(),
                source,
            })
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn attempt(&self, spec: &TargetSpec, deadline: Instant) -> ProbeResult<Verdict> {
        let pattern = self.pattern(spec)?;

        let mut stream =
            TcpStream::connect(spec.dest.as_str())
                .await
                .map_err(|source| ProbeError::Connect {
                    dest: spec.dest.clone(),
                    source,
                })?;

        let Some(pattern) = pattern else {
            return Ok(Verdict::Alive);
        };

        let limit = spec.response_limit(DEFAULT_TCP_RES_SIZE);
        let mut received = Vec::with_capacity(limit.min(INITIAL_CAPACITY));
        let mut chunk = [0u8; READ_CHUNK];
        while received.len() < limit {
            let want = (limit - received.len()).min(READ_CHUNK);
            let read = match tokio::time::timeout_at(deadline, stream.read(&mut chunk[..want])).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    return Err(ProbeError::Read {
                        dest: spec.dest.clone(),
                        reason: e.to_string(),
                    })
                }
                // Nothing more is coming in time; judge what we have.
                Err(_) if !received.is_empty() => break,
                Err(_) => return Err(ProbeError::Timeout(spec.timeout)),
            };
            received.extend_from_slice(&chunk[..read]);
            if pattern.is_match(&received) {
                debug!(target_name = %spec.name, bytes = received.len(), "pattern matched");
                return Ok(Verdict::Alive);
            }
        }

        if pattern.is_match(&received) {
            return Ok(Verdict::Alive);
        }
        Ok(Verdict::Mismatch(format!(
            "pattern {:?} not found in {} bytes",
            pattern.as_str(),
            received.len()
        )))
    }
}
