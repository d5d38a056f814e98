use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{ProbeError, ValidationError};
use crate::executor::ProbeExecutor;
use crate::model::{Endpoint, ProbeResult};
use crate::progress::ProbeEvent;
use crate::ranker::assign_ranks;
use crate::validation::{MAX_CONCURRENCY, validate_endpoints};

type Queue = Arc<Mutex<VecDeque<(usize, Endpoint)>>>;

/// Probe scheduler - runs a batch of probes through a fixed worker pool
pub struct ProbeScheduler {
    executor: Arc<ProbeExecutor>,
}

impl ProbeScheduler {
    /// Create a new probe scheduler
    pub fn new(executor: Arc<ProbeExecutor>) -> Self {
        Self { executor }
    }

    /// Probe every endpoint with at most `limit` probes in flight.
    ///
    /// Endpoints are admitted in input order. Progress is reported on
    /// `events`; a closed channel only stops the reporting. Every admitted
    /// endpoint gets a `Finished` event, even when its probe panics.
    ///
    /// The returned results are in input order, ranked on their own. A
    /// [`RunService`](crate::runner::RunService) ranks from the events instead
    /// and ignores this vector.
    pub async fn run_all(
        &self,
        endpoints: Vec<Endpoint>,
        limit: usize,
        events: mpsc::Sender<ProbeEvent>,
    ) -> Result<Vec<ProbeResult>, ValidationError> {
        validate_endpoints(&endpoints)?;
        if !(1..=MAX_CONCURRENCY).contains(&limit) {
            return Err(ValidationError::ConcurrencyOutOfRange {
                value: limit,
                min: 1,
                max: MAX_CONCURRENCY,
            });
        }

        let total = endpoints.len();
        let queue: Queue = Arc::new(Mutex::new(endpoints.into_iter().enumerate().collect()));
        let workers = limit.min(total);
        debug!(total, workers, "Starting probe workers");

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let executor = self.executor.clone();
            let queue = queue.clone();
            let events = events.clone();
            handles.push(tokio::spawn(async move { work(worker, executor, queue, events).await }));
        }
        drop(events);

        let mut slots: Vec<Option<ProbeResult>> = vec![None; total];
        for handle in handles {
            match handle.await {
                Ok(finished) => {
                    for (index, result) in finished {
                        slots[index] = Some(result);
                    }
                }
                Err(e) => error!("Probe worker panicked: {}", e),
            }
        }

        let mut results: Vec<ProbeResult> = slots.into_iter().flatten().collect();
        if results.len() < total {
            error!(missing = total - results.len(), "Probe results lost to a panicked worker");
        }
        assign_ranks(&mut results);
        Ok(results)
    }
}

/// Worker loop: pop, announce, probe, report, until the queue is empty
async fn work(
    worker: usize,
    executor: Arc<ProbeExecutor>,
    queue: Queue,
    events: mpsc::Sender<ProbeEvent>,
) -> Vec<(usize, ProbeResult)> {
    let mut finished = Vec::new();

    loop {
        let (index, endpoint, id) = {
            let mut pending = queue.lock().await;
            let Some((index, endpoint)) = pending.pop_front() else {
                break;
            };
            let id = Uuid::new_v4();
            // Sent under the lock so events arrive in admission order
            let placeholder = ProbeResult::testing(id, &endpoint);
            let _ = events.send(ProbeEvent::Started { index, placeholder }).await;
            (index, endpoint, id)
        };

        let result = {
            let executor = executor.clone();
            let endpoint = endpoint.clone();
            tokio::spawn(async move { executor.probe(id, &endpoint).await }).await
        };
        let result = result.unwrap_or_else(|e| {
            error!(worker, index, isp = %endpoint.isp_name, "Probe aborted: {}", e);
            ProbeResult::testing(id, &endpoint).failure(&ProbeError::Aborted(e.to_string()))
        });
        debug!(worker, index, isp = %endpoint.isp_name, status = %result.status, "Probe finished");

        let _ = events.send(ProbeEvent::Finished { index, result: result.clone() }).await;
        finished.push((index, result));
    }

    finished
}
