//! Attempt loop shared by every prober.

use dnswatch_core::TargetSpec;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::ProbeError;
use crate::prober::{Prober, Verdict};

/// Attempt budget of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least one
    pub attempts: u32,
    /// Pause after a failed attempt that is followed by another
    pub retry_wait: Duration,
    /// Deadline of each attempt
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Policy configured on a target
    #[must_use]
    pub const fn from_target(spec: &TargetSpec) -> Self {
        Self {
            attempts: spec.retry.saturating_add(1),
            retry_wait: spec.retry_wait,
            timeout: spec.timeout,
        }
    }

    /// Longest time a probe under this policy can take
    #[must_use]
    pub fn worst_case(&self) -> Duration {
        self.timeout
            .saturating_mul(self.attempts)
            .saturating_add(self.retry_wait.saturating_mul(self.attempts.saturating_sub(1)))
    }
}

/// Run attempts of `prober` against `spec` until one is conclusive.
///
/// - [`Verdict::Alive`] returns alive at once
/// - [`Verdict::Mismatch`] returns dead at once
/// - a non-transient error returns dead at once
/// - a transient error or overrun deadline is retried after `retry_wait`
///
/// After the last attempt fails the target is dead and the last error is
/// logged.
pub async fn probe_with_retry<P>(prober: &P, spec: &TargetSpec) -> bool
where
    P: Prober + ?Sized,
{
    let policy = RetryPolicy::from_target(spec);
    let mut last_error = None;

    for attempt in 1..=policy.attempts {
        let deadline = Instant::now() + policy.timeout;
        let outcome = tokio::time::timeout_at(deadline, prober.attempt(spec, deadline))
            .await
            .unwrap_or_else(|_| Err(ProbeError::Timeout(policy.timeout)));

        match outcome {
            Ok(Verdict::Alive) => {
                debug!(target_name = %spec.name, dest = %spec.dest, attempt, "target alive");
                return true;
            }
            Ok(Verdict::Mismatch(reason)) => {
                info!(target_name = %spec.name, dest = %spec.dest, %reason, "target answered with mismatch");
                return false;
            }
            Err(e) if !e.is_transient() => {
                error!(target_name = %spec.name, dest = %spec.dest, error = %e, "target cannot be probed");
                return false;
            }
            Err(e) => {
                debug!(target_name = %spec.name, attempt, error = %e, "probe attempt failed");
                last_error = Some(e);
            }
        }

        if attempt < policy.attempts && !policy.retry_wait.is_zero() {
            tokio::time::sleep(policy.retry_wait).await;
        }
    }

    warn!(
        target_name = %spec.name,
        dest = %spec.dest,
        attempts = policy.attempts,
        error = %last_error.map_or_else(String::new, |e| e.to_string()),
        "retries exhausted, target is dead"
    );
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeResult;
    use async_trait::async_trait;
    use dnswatch_core::Protocol;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays a fixed sequence of outcomes, then keeps failing
    struct Script {
        calls: AtomicU32,
        outcomes: Vec<fn() -> ProbeResult<Verdict>>,
        stall: Option<Duration>,
    }

    impl Script {
        fn new(outcomes: Vec<fn() -> ProbeResult<Verdict>>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                outcomes,
                stall: None,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Prober for Script {
        async fn attempt(&self, _spec: &TargetSpec, _deadline: Instant) -> ProbeResult<Verdict> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            self.outcomes.get(n).map_or_else(refused, |f| f())
        }
    }

    fn refused() -> ProbeResult<Verdict> {
        Err(ProbeError::Socket("refused".into()))
    }

    fn alive() -> ProbeResult<Verdict> {
        Ok(Verdict::Alive)
    }

    fn mismatch() -> ProbeResult<Verdict> {
        Ok(Verdict::Mismatch("status 503".into()))
    }

    fn missing_pattern() -> ProbeResult<Verdict> {
        Err(ProbeError::MissingPattern("a".into()))
    }

    fn spec(retry: u32) -> TargetSpec {
        TargetSpec::new("a", Protocol::Tcp, "127.0.0.1:1")
            .retry(retry)
            .timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_alive_stops_retrying() {
        let script = Script::new(vec![refused, alive, refused]);
        assert!(probe_with_retry(&script, &spec(5)).await);
        assert_eq!(script.calls(), 2);
    }

    #[tokio::test]
    async fn test_transient_errors_use_full_budget() {
        let script = Script::new(vec![]);
        assert!(!probe_with_retry(&script, &spec(3)).await);
        assert_eq!(script.calls(), 4);
    }

    #[tokio::test]
    async fn test_mismatch_does_not_consume_retries() {
        let script = Script::new(vec![mismatch, alive]);
        assert!(!probe_with_retry(&script, &spec(3)).await);
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test]
    async fn test_config_fault_is_not_retried() {
        let script = Script::new(vec![missing_pattern, alive]);
        assert!(!probe_with_retry(&script, &spec(3)).await);
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test]
    async fn test_overrunning_attempt_times_out_and_retries() {
        let mut script = Script::new(vec![alive, alive]);
        script.stall = Some(Duration::from_secs(5));
        let spec = spec(1).timeout(Duration::from_millis(50));

        let started = std::time::Instant::now();
        assert!(!probe_with_retry(&script, &spec).await);
        assert_eq!(script.calls(), 2);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_retry_wait_between_attempts() {
        let script = Script::new(vec![]);
        let spec = spec(2).retry_wait(Duration::from_millis(40));

        let started = std::time::Instant::now();
        assert!(!probe_with_retry(&script, &spec).await);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(80));
        assert!(elapsed <= RetryPolicy::from_target(&spec).worst_case() + Duration::from_millis(500));
    }

    #[test]
    fn test_policy_matches_target_worst_case() {
        let spec = spec(2).retry_wait(Duration::from_millis(100));
        let policy = RetryPolicy::from_target(&spec);
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.worst_case(), spec.worst_case());
    }
}
