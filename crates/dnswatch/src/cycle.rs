//! One evaluation cycle of a record: probe, evaluate, commit, notify.

use dnswatch_core::{AliveChange, Record};
use dnswatch_probe::ProberSet;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::dispatch::dispatch;
use crate::notifier::Notifier;

/// Result of a completed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Published value before and after the cycle
    pub change: AliveChange,
    /// A notification was handed to the notifier
    pub notified: bool,
}

/// Clears the record's progress flag on every exit path
struct CycleGuard<'a>(&'a Record);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.finish_cycle();
    }
}

/// Run a cycle if no other cycle of `record` is in flight.
///
/// Returns `None` when the record was busy.
pub async fn try_evaluate(
    record: Arc<Record>,
    probers: Arc<ProberSet>,
    notifier: Arc<dyn Notifier>,
) -> Option<CycleOutcome> {
    if !record.try_begin_cycle() {
        debug!(record = %record.name(), content = %record.content(), "cycle already in flight");
        return None;
    }
    Some(evaluate_claimed(record, probers, notifier).await)
}

/// Run a cycle for a record whose progress flag the caller already set.
///
/// The flag is cleared once the verdict and the notification decision are
/// committed; delivery runs on its own task afterwards.
pub async fn evaluate_claimed(
    record: Arc<Record>,
    probers: Arc<ProberSet>,
    notifier: Arc<dyn Notifier>,
) -> CycleOutcome {
    let guard = CycleGuard(&record);

    dispatch(&record, &probers).await;

    let verdict = match record.evaluate() {
        Ok(verdict) => verdict,
        Err(e) => {
            error!(
                zone = %record.zone(),
                record = %record.name(),
                content = %record.content(),
                rule = %record.rule_source(),
                error = %e,
                "rule evaluation failed, record is dead"
            );
            false
        }
    };

    let change = record.commit(verdict);
    let notified = record.should_notify(change);
    if change.changed() {
        info!(
            zone = %record.zone(),
            record = %record.name(),
            content = %record.content(),
            alive = change.current,
            "record alive state changed"
        );
    }
    let transition = notified.then(|| record.transition(change));
    drop(guard);

    if let Some(transition) = transition {
        tokio::spawn(async move {
            notifier.notify(&transition).await;
        });
    }

    CycleOutcome { change, notified }
}
