//! Tick loop launching evaluation cycles.

use dnswatch_core::{WatchSnapshot, WatchState};
use dnswatch_probe::ProberSet;
use futures_util::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::WatcherConfig;
use crate::cycle::{evaluate_claimed, try_evaluate};
use crate::error::{Error, Result};
use crate::notifier::{LogNotifier, Notifier};

const DEFAULT_TICK: Duration = Duration::from_secs(1);
const IDLE_POLL: Duration = Duration::from_millis(10);

/// The liveness watcher.
///
/// Cheap to clone; clones share state and the tick loop.
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    state: Arc<WatchState>,
    probers: Arc<ProberSet>,
    notifier: Arc<dyn Notifier>,
    tick: Duration,
    running: AtomicBool,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Watcher {
    /// Create a watcher with the default tick and a [`LogNotifier`]
    #[must_use]
    pub fn new(state: Arc<WatchState>, probers: ProberSet) -> Self {
        Self::builder(state, probers).build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder(state: Arc<WatchState>, probers: ProberSet) -> WatcherBuilder {
        WatcherBuilder {
            state,
            probers,
            notifier: None,
            tick: DEFAULT_TICK,
        }
    }

    /// Validate `config` and build a watcher with the standard probers
    pub fn from_config(config: &WatcherConfig) -> Result<Self> {
        config.validate()?;
        let state = Arc::new(config.build_state());
        let probers = ProberSet::standard()?;
        Ok(Self::builder(state, probers)
            .tick(config.tick())
            .notifier(Arc::new(LogNotifier::new(config.notifier.clone())))
            .build())
    }

    /// Shared watch state
    #[must_use]
    pub fn state(&self) -> &Arc<WatchState> {
        &self.inner.state
    }

    /// Read-only view for the DNS read model
    #[must_use]
    pub fn snapshot(&self) -> WatchSnapshot {
        self.inner.state.snapshot()
    }

    /// Tick period
    #[must_use]
    pub fn tick(&self) -> Duration {
        self.inner.tick
    }

    /// Returns true between `start` and `stop`
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Start the tick loop. The first tick fires immediately.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(&self) -> Result<()> {
        // Held until the handle is stored so `stop` never sees a half start.
        let mut slot = self.ticker();
        if self.inner.running.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyRunning);
        }
        info!(
            records = self.inner.state.record_count(),
            tick_ms = u64::try_from(self.inner.tick.as_millis()).unwrap_or(u64::MAX),
            "watcher started"
        );

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !inner.running.load(Ordering::Acquire) {
                    break;
                }
                inner.tick_once();
            }
        });
        *slot = Some(handle);
        Ok(())
    }

    /// Stop launching cycles. Cycles already in flight run to completion;
    /// use [`Watcher::wait_idle`] to wait for them.
    pub async fn stop(&self) {
        let handle = {
            let mut slot = self.ticker();
            if !self.inner.running.swap(false, Ordering::AcqRel) {
                return;
            }
            slot.take()
        };
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
        info!("watcher stopped");
    }

    /// Advance every record by one tick, launching the cycles that are
    /// due. Returns the number of cycles launched.
    pub fn tick_once(&self) -> usize {
        self.inner.tick_once()
    }

    /// Run one cycle for every record not already in flight and wait for
    /// all of them. Returns the number of cycles run.
    pub async fn check_once(&self) -> usize {
        let inner = &self.inner;
        let cycles = inner.state.records().map(|record| {
            try_evaluate(
                Arc::clone(record),
                Arc::clone(&inner.probers),
                Arc::clone(&inner.notifier),
            )
        });
        join_all(cycles).await.into_iter().flatten().count()
    }

    /// Wait until no record has a cycle in flight
    pub async fn wait_idle(&self) {
        while self.inner.state.records().any(|r| r.in_progress()) {
            tokio::time::sleep(IDLE_POLL).await;
        }
    }

    fn ticker(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WatcherInner {
    fn tick_once(&self) -> usize {
        let mut launched = 0;
        for record in self.state.records() {
            if !record.advance_interval() {
                continue;
            }
            if !record.try_begin_cycle() {
                debug!(
                    record = %record.name(),
                    content = %record.content(),
                    "previous cycle still in flight, skipping"
                );
                continue;
            }
            record.reset_interval();
            tokio::spawn(evaluate_claimed(
                Arc::clone(record),
                Arc::clone(&self.probers),
                Arc::clone(&self.notifier),
            ));
            launched += 1;
        }
        launched
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("records", &self.inner.state.record_count())
            .field("probers", &self.inner.probers)
            .field("tick", &self.inner.tick)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Watcher`]
pub struct WatcherBuilder {
    state: Arc<WatchState>,
    probers: ProberSet,
    notifier: Option<Arc<dyn Notifier>>,
    tick: Duration,
}

impl WatcherBuilder {
    /// Set the tick period (minimum 1 ms)
    #[must_use]
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self
    }

    /// Set the notifier
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Build the watcher
    #[must_use]
    pub fn build(self) -> Watcher {
        Watcher {
            inner: Arc::new(WatcherInner {
                state: self.state,
                probers: Arc::new(self.probers),
                notifier: self
                    .notifier
                    .unwrap_or_else(|| Arc::new(LogNotifier::default())),
                tick: self.tick,
                running: AtomicBool::new(false),
                ticker: Mutex::new(None),
            }),
        }
    }
}
