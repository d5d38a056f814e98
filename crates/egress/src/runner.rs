//! Run orchestration: validate a submission, create its session, and drive
//! the scheduler in the background while a recorder folds its events into
//! the store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::ValidationError;
use crate::executor::ProbeExecutor;
use crate::model::Endpoint;
use crate::progress::{ProbeEvent, ProgressAggregator};
use crate::ranker::assign_ranks;
use crate::scheduler::ProbeScheduler;
use crate::store::{RunSnapshot, SessionStore};
use crate::validation::validate_run;

const EVENT_BUFFER: usize = 256;

/// A run submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(alias = "proxies", default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(alias = "concurrency", default, skip_serializing_if = "Option::is_none")]
    pub concurrency_limit: Option<usize>,
}

impl RunRequest {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self { endpoints, concurrency_limit: None }
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency_limit = Some(limit);
        self
    }
}

/// Submits runs and answers polls against a shared session store
pub struct RunService {
    scheduler: Arc<ProbeScheduler>,
    store: Arc<SessionStore>,
    config: SchedulerConfig,
}

impl RunService {
    pub fn new(executor: Arc<ProbeExecutor>, store: Arc<SessionStore>, config: SchedulerConfig) -> Self {
        Self { scheduler: Arc::new(ProbeScheduler::new(executor)), store, config }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Validate and start a run, returning its id without waiting for it
    pub async fn submit(&self, request: RunRequest) -> Result<Uuid, ValidationError> {
        self.start(request).await.map(|(run_id, _)| run_id)
    }

    /// Start a run and wait for it to finish, returning the final snapshot
    pub async fn execute(&self, request: RunRequest) -> Result<(Uuid, RunSnapshot), ValidationError> {
        let (run_id, handle) = self.start(request).await?;
        if let Err(e) = handle.await {
            error!(run_id = %run_id, "Run task failed: {}", e);
        }
        let snapshot = self.poll(run_id).await.unwrap_or_else(|| RunSnapshot {
            results: Vec::new(),
            progress: Default::default(),
        });
        Ok((run_id, snapshot))
    }

    /// Current results and progress of a run
    pub async fn poll(&self, run_id: Uuid) -> Option<RunSnapshot> {
        self.store.get(run_id).await
    }

    async fn start(&self, request: RunRequest) -> Result<(Uuid, JoinHandle<()>), ValidationError> {
        let limit = validate_run(&request.endpoints, request.concurrency_limit, &self.config)?;
        let endpoints = request.endpoints;

        let run_id = self.store.create(endpoints.clone()).await;
        info!(run_id = %run_id, endpoints = endpoints.len(), concurrency = limit, "Run started");

        let handle = tokio::spawn(drive(run_id, self.scheduler.clone(), self.store.clone(), endpoints, limit));
        Ok((run_id, handle))
    }
}

async fn drive(
    run_id: Uuid,
    scheduler: Arc<ProbeScheduler>,
    store: Arc<SessionStore>,
    endpoints: Vec<Endpoint>,
    limit: usize,
) {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let recorder = tokio::spawn(record(run_id, store, endpoints.len(), rx));

    // The session is ranked by the recorder; the scheduler's own copy is not needed
    match scheduler.run_all(endpoints, limit, tx).await {
        Ok(_) => debug!(run_id = %run_id, "Scheduler finished"),
        Err(e) => error!(run_id = %run_id, "Scheduler rejected run: {}", e),
    }

    if let Err(e) = recorder.await {
        error!(run_id = %run_id, "Run recorder failed: {}", e);
    }
}

/// Apply every event to the aggregator and the session, ranking once the
/// last probe has finished
async fn record(
    run_id: Uuid,
    store: Arc<SessionStore>,
    total: usize,
    mut events: mpsc::Receiver<ProbeEvent>,
) {
    let mut aggregator = ProgressAggregator::new(total);

    while let Some(event) = events.recv().await {
        let progress = aggregator.apply(&event);
        let result = event.into_result();

        let recorded = store
            .update(run_id, |session| {
                session.upsert(result);
                session.progress = progress;
                // Ranks land in the same critical section as the final count
                if progress.is_complete() {
                    assign_ranks(&mut session.results);
                }
            })
            .await;

        if let Err(e) = recorded {
            warn!(run_id = %run_id, "Dropping probe event: {}", e);
            continue;
        }

        if progress.is_complete() {
            info!(
                run_id = %run_id,
                successful = progress.successful,
                failed = progress.failed,
                "Run completed"
            );
        }
    }
}
