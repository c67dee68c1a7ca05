//! Liveness probers for dnswatch targets.
//!
//! Each protocol is a [`Prober`]: a single attempt returns a [`Verdict`] or
//! a [`ProbeError`], and [`probe_with_retry`] turns attempts into the final
//! alive flag under the target's retry budget:
//!
//! - transient I/O faults are retried, then reported dead at warn level
//! - content or status mismatches are dead immediately
//! - configuration faults (bad pattern, bad destination) are dead immediately
//!
//! [`ProberSet`] maps each declared [`Protocol`](dnswatch_core::Protocol) to
//! its prober. Protocols without a prober always probe dead.

#![doc(html_root_url = "https://docs.rs/dnswatch-probe/0.3.0")]

mod error;
mod http;
mod icmp;
mod prober;
mod regex_cache;
mod retry;
mod tcp;

pub use error::{ProbeError, ProbeResult};
pub use http::{HttpProber, DEFAULT_HTTP_RES_SIZE};
pub use icmp::{IcmpProber, ECHO_PAYLOAD};
pub use prober::{Prober, ProberSet, Verdict};
pub use regex_cache::RegexCache;
pub use retry::{probe_with_retry, RetryPolicy};
pub use tcp::{TcpProber, DEFAULT_TCP_RES_SIZE};
