//! Periodic report of test spans that never got linked
//!
//! Unlinked spans are kept indefinitely. This task only counts the ones older
//! than the staleness threshold and logs them so operators can spot test
//! executions whose records were never created.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::data::{DataError, TraceRepository};

/// Count stale unlinked test spans, warning when there are any
pub async fn audit_unlinked_spans(
    repo: &dyn TraceRepository,
    staleness: Duration,
) -> Result<u64, DataError> {
    let cutoff = Utc::now()
        - chrono::Duration::from_std(staleness).unwrap_or_else(|_| chrono::Duration::days(1));
    let count = repo.count_unlinked_spans(cutoff).await?;
    if count > 0 {
        tracing::warn!(
            count,
            staleness_secs = staleness.as_secs(),
            "Test spans still unlinked past staleness threshold"
        );
    } else {
        tracing::debug!("No stale unlinked test spans");
    }
    Ok(count)
}

pub fn start_unlinked_audit_task(
    repo: Arc<dyn TraceRepository>,
    interval: Duration,
    staleness: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so startup stays quiet
        ticker.tick().await;
        loop {
            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::debug!("Unlinked span audit shutting down");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = audit_unlinked_spans(repo.as_ref(), staleness).await {
                        tracing::warn!(error = %e, "Unlinked span audit failed");
                    }
                }
            }
        }
    })
}
