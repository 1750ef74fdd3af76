//! In-process worker pool
//!
//! Jobs go through one bounded queue shared by every worker. Liveness pings
//! are broadcast; each worker answers with its name from inside its own loop,
//! so a worker stuck on a long job answers late rather than never.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use super::enricher::TraceEnricher;

/// Unit of background work: enrich one trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentJob {
    pub trace_id: String,
    pub project_id: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("No workers configured")]
    NoWorkers,

    #[error("Enrichment queue is full")]
    QueueFull,

    #[error("Worker pool is shut down")]
    Closed,
}

/// Background worker pool as seen by the orchestrator
#[async_trait]
pub trait WorkerPool: Send + Sync {
    /// Hand a job to the pool without waiting for it to run
    async fn enqueue(&self, job: EnrichmentJob) -> Result<(), WorkerError>;

    /// Names of the workers that answered within `timeout`
    async fn ping(&self, timeout: Duration) -> Result<Vec<String>, WorkerError>;
}

#[derive(Clone)]
struct PingRequest {
    reply: mpsc::Sender<String>,
}

pub struct LocalWorkerPool {
    jobs: mpsc::Sender<EnrichmentJob>,
    pings: broadcast::Sender<PingRequest>,
    worker_count: usize,
}

impl LocalWorkerPool {
    /// Spawn `workers` tasks consuming a queue of `capacity` jobs.
    ///
    /// With zero workers the pool accepts no jobs and every ping comes back
    /// empty.
    pub fn spawn(
        workers: usize,
        capacity: usize,
        enricher: Arc<dyn TraceEnricher>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (jobs_tx, jobs_rx) = mpsc::channel(capacity.max(1));
        let (pings_tx, _) = broadcast::channel(16);
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));
        let pid = std::process::id();

        let handles = (0..workers)
            .map(|i| {
                let worker = Worker {
                    name: format!("worker-{i}@{pid}"),
                    jobs: jobs_rx.clone(),
                    pings: pings_tx.subscribe(),
                    enricher: enricher.clone(),
                };
                tokio::spawn(worker.run(shutdown_rx.clone()))
            })
            .collect();

        tracing::debug!(workers, capacity, "Enrichment worker pool started");

        let pool = Self {
            jobs: jobs_tx,
            pings: pings_tx,
            worker_count: workers,
        };
        (pool, handles)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}

#[async_trait]
impl WorkerPool for LocalWorkerPool {
    async fn enqueue(&self, job: EnrichmentJob) -> Result<(), WorkerError> {
        if self.worker_count == 0 {
            return Err(WorkerError::NoWorkers);
        }
        self.jobs.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => WorkerError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => WorkerError::Closed,
        })
    }

    async fn ping(&self, timeout: Duration) -> Result<Vec<String>, WorkerError> {
        if self.worker_count == 0 {
            return Ok(Vec::new());
        }

        let (reply_tx, mut reply_rx) = mpsc::channel(self.worker_count);
        // No live subscriber means every worker has exited
        if self.pings.send(PingRequest { reply: reply_tx }).is_err() {
            return Ok(Vec::new());
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let mut names = Vec::with_capacity(self.worker_count);
        while names.len() < self.worker_count {
            match tokio::time::timeout_at(deadline, reply_rx.recv()).await {
                Ok(Some(name)) => names.push(name),
                // All reply senders dropped, or deadline reached
                Ok(None) | Err(_) => break,
            }
        }
        Ok(names)
    }
}

struct Worker {
    name: String,
    jobs: Arc<Mutex<mpsc::Receiver<EnrichmentJob>>>,
    pings: broadcast::Receiver<PingRequest>,
    enricher: Arc<dyn TraceEnricher>,
}

impl Worker {
    async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::debug!(worker = %self.name, "Enrichment worker started");

        loop {
            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                ping = self.pings.recv() => {
                    match ping {
                        Ok(request) => {
                            let _ = request.reply.send(self.name.clone()).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::debug!(worker = %self.name, skipped = n, "Worker skipped stale pings");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                job = Self::next_job(&self.jobs) => {
                    match job {
                        Some(job) => self.process(job).await,
                        None => break,
                    }
                }
            }
        }

        // Drain what was queued before shutdown
        loop {
            let job = self.jobs.lock().await.try_recv();
            match job {
                Ok(job) => self.process(job).await,
                Err(_) => break,
            }
        }

        tracing::debug!(worker = %self.name, "Enrichment worker stopped");
    }

    async fn next_job(jobs: &Mutex<mpsc::Receiver<EnrichmentJob>>) -> Option<EnrichmentJob> {
        jobs.lock().await.recv().await
    }

    async fn process(&self, job: EnrichmentJob) {
        match self.enricher.enrich(&job.trace_id, &job.project_id).await {
            Ok(Some(_)) => {
                tracing::debug!(worker = %self.name, trace_id = %job.trace_id, "Trace enriched");
            }
            Ok(None) => {
                tracing::debug!(worker = %self.name, trace_id = %job.trace_id, "Trace has no spans to enrich");
            }
            Err(e) => {
                tracing::warn!(
                    worker = %self.name,
                    error = %e,
                    trace_id = %job.trace_id,
                    project_id = %job.project_id,
                    "Background enrichment failed"
                );
            }
        }
    }
}
