use dnswatch_core::Record;
use dnswatch_probe::ProberSet;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::error;

/// Probe every target of `record` concurrently and store each result on
/// its target.
///
/// Returns once every target has a fresh alive flag. A probe task that
/// panics leaves its target dead.
pub async fn dispatch(record: &Arc<Record>, probers: &Arc<ProberSet>) {
    let handles: Vec<_> = (0..record.targets().len())
        .map(|index| {
            let record = Arc::clone(record);
            let probers = Arc::clone(probers);
            tokio::spawn(async move {
                let target = &record.targets()[index];
                let alive = probers.is_alive(target.spec()).await;
                target.set_alive(alive);
            })
        })
        .collect();

    for (target, joined) in record.targets().iter().zip(join_all(handles).await) {
        if let Err(e) = joined {
            error!(
                record = %record.name(),
                target_name = %target.name(),
                error = %e,
                "probe task failed"
            );
            target.set_alive(false);
        }
    }
}
