//! Enrichment dispatch: background workers when reachable, inline otherwise
//!
//! Enrichment is best effort. Nothing here returns an error to the caller:
//! probe failures count as "no workers", enqueue failures fall back to the
//! synchronous path, and synchronous failures are logged and dropped.
//!
//! ```text
//! enrich_many(traces) ─▶ probe once ─┬─ Available ─▶ enqueue ─┬─ ok ─▶ Async
//!                                    │                        └─ err ─┐
//!                                    └─ Unavailable ──────────────────┴▶ enrich inline ─▶ Sync
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use super::enricher::TraceEnricher;
use super::worker::{EnrichmentJob, WorkerPool};

/// Result of a liveness probe, valid for one batch only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerAvailability {
    Available(usize),
    Unavailable,
}

impl WorkerAvailability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

/// Where a trace's enrichment actually ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Async,
    Sync,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchCounts {
    pub dispatched_async: usize,
    pub executed_sync: usize,
}

impl DispatchCounts {
    fn record(&mut self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Async => self.dispatched_async += 1,
            Dispatch::Sync => self.executed_sync += 1,
        }
    }
}

pub struct EnrichmentOrchestrator {
    workers: Arc<dyn WorkerPool>,
    enricher: Arc<dyn TraceEnricher>,
    probe_timeout: Duration,
}

impl EnrichmentOrchestrator {
    pub fn new(
        workers: Arc<dyn WorkerPool>,
        enricher: Arc<dyn TraceEnricher>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            workers,
            enricher,
            probe_timeout,
        }
    }

    /// Ping the pool, bounded by the probe timeout.
    ///
    /// An error, an empty answer or a timeout all mean `Unavailable`.
    pub async fn probe(&self) -> WorkerAvailability {
        let ping = tokio::time::timeout(self.probe_timeout, self.workers.ping(self.probe_timeout));
        match ping.await {
            Ok(Ok(names)) if !names.is_empty() => WorkerAvailability::Available(names.len()),
            Ok(Ok(_)) => {
                tracing::debug!("No enrichment workers answered the probe");
                WorkerAvailability::Unavailable
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Worker probe failed");
                WorkerAvailability::Unavailable
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "Worker probe timed out"
                );
                WorkerAvailability::Unavailable
            }
        }
    }

    pub async fn workers_available(&self) -> bool {
        self.probe().await.is_available()
    }

    /// Enrich one trace. Probes first unless `availability` is given.
    pub async fn dispatch(
        &self,
        trace_id: &str,
        project_id: &str,
        availability: Option<WorkerAvailability>,
    ) -> Dispatch {
        let availability = match availability {
            Some(known) => known,
            None => self.probe().await,
        };

        if availability.is_available() {
            let job = EnrichmentJob {
                trace_id: trace_id.to_string(),
                project_id: project_id.to_string(),
            };
            match self.workers.enqueue(job).await {
                Ok(()) => return Dispatch::Async,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        trace_id,
                        project_id,
                        "Enqueue failed, enriching inline"
                    );
                }
            }
        }

        if let Err(e) = self.enricher.enrich(trace_id, project_id).await {
            tracing::warn!(error = %e, trace_id, project_id, "Inline enrichment failed");
        }
        Dispatch::Sync
    }

    /// `true` when the job went to a background worker
    pub async fn enqueue(
        &self,
        trace_id: &str,
        project_id: &str,
        workers_available: Option<bool>,
    ) -> bool {
        let availability = workers_available.map(|up| {
            if up {
                WorkerAvailability::Available(1)
            } else {
                WorkerAvailability::Unavailable
            }
        });
        self.dispatch(trace_id, project_id, availability).await == Dispatch::Async
    }

    /// Enrich a set of traces with a single probe for the whole batch
    pub async fn enrich_many(&self, trace_ids: &BTreeSet<String>, project_id: &str) -> DispatchCounts {
        self.dispatch_all(trace_ids.iter().map(|t| (project_id, t.as_str())), trace_ids.len())
            .await
    }

    /// Like `enrich_many`, for a batch spanning several projects.
    /// Entries are `(project_id, trace_id)`; the pool is still probed once.
    pub async fn enrich_batch(&self, traces: &BTreeSet<(String, String)>) -> DispatchCounts {
        self.dispatch_all(traces.iter().map(|(p, t)| (p.as_str(), t.as_str())), traces.len())
            .await
    }

    async fn dispatch_all<'a>(
        &self,
        traces: impl Iterator<Item = (&'a str, &'a str)>,
        len: usize,
    ) -> DispatchCounts {
        let mut counts = DispatchCounts::default();
        if len == 0 {
            return counts;
        }

        let availability = self.probe().await;
        for (project_id, trace_id) in traces {
            counts.record(self.dispatch(trace_id, project_id, Some(availability)).await);
        }

        tracing::debug!(
            traces = len,
            dispatched_async = counts.dispatched_async,
            executed_sync = counts.executed_sync,
            "Enrichment dispatched"
        );
        counts
    }
}
