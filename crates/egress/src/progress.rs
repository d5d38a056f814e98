use crate::model::{ProbeResult, Progress};

/// Emitted by the scheduler as probes start and finish.
///
/// `index` is the endpoint's position in the submitted list. For one
/// endpoint, `Started` is always emitted before `Finished`.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeEvent {
    /// Probe admitted; carries the `testing` placeholder
    Started { index: usize, placeholder: ProbeResult },
    /// Probe done, successful or not
    Finished { index: usize, result: ProbeResult },
}

impl ProbeEvent {
    pub fn into_result(self) -> ProbeResult {
        match self {
            ProbeEvent::Started { placeholder, .. } => placeholder,
            ProbeEvent::Finished { result, .. } => result,
        }
    }
}

/// Folds probe events into run counters.
///
/// Holds nothing that cannot be rebuilt by replaying the events from zero.
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    progress: Progress,
}

impl ProgressAggregator {
    pub fn new(total: usize) -> Self {
        Self { progress: Progress::new(total) }
    }

    /// Rebuild the counters from a complete event history
    pub fn replay<'a>(total: usize, events: impl IntoIterator<Item = &'a ProbeEvent>) -> Progress {
        let mut aggregator = Self::new(total);
        for event in events {
            aggregator.apply(event);
        }
        aggregator.snapshot()
    }

    /// Apply one event and return the updated counters
    pub fn apply(&mut self, event: &ProbeEvent) -> Progress {
        let progress = &mut self.progress;
        match event {
            ProbeEvent::Started { .. } => {
                progress.running += 1;
            }
            ProbeEvent::Finished { result, .. } => {
                progress.running = progress.running.saturating_sub(1);
                progress.completed += 1;
                if result.is_success() {
                    progress.successful += 1;
                } else {
                    progress.failed += 1;
                }
            }
        }
        self.progress
    }

    pub fn snapshot(&self) -> Progress {
        self.progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::model::Endpoint;
    use uuid::Uuid;

    fn started(index: usize) -> ProbeEvent {
        let endpoint = Endpoint::new(format!("ISP {index}"), "Germany");
        ProbeEvent::Started { index, placeholder: ProbeResult::testing(Uuid::new_v4(), &endpoint) }
    }

    fn finished(index: usize, ok: bool) -> ProbeEvent {
        let endpoint = Endpoint::new(format!("ISP {index}"), "Germany");
        let placeholder = ProbeResult::testing(Uuid::new_v4(), &endpoint);
        let result = if ok {
            placeholder.success(10.0, 20.0)
        } else {
            placeholder.failure(&ProbeError::Timeout { stage: "full fetch", after_ms: 15_000 })
        };
        ProbeEvent::Finished { index, result }
    }

    #[test]
    fn test_counters_follow_events() {
        let mut aggregator = ProgressAggregator::new(3);

        let p = aggregator.apply(&started(0));
        assert_eq!((p.running, p.completed), (1, 0));

        aggregator.apply(&started(1));
        let p = aggregator.apply(&finished(0, true));
        assert_eq!((p.running, p.completed, p.successful, p.failed), (1, 1, 1, 0));

        aggregator.apply(&started(2));
        aggregator.apply(&finished(2, false));
        let p = aggregator.apply(&finished(1, true));
        assert_eq!(p, Progress { total: 3, completed: 3, running: 0, failed: 1, successful: 2 });
        assert!(p.is_complete());
    }

    #[test]
    fn test_invariants_hold_at_every_step() {
        let events = vec![
            started(0),
            started(1),
            finished(1, false),
            started(2),
            finished(0, true),
            started(3),
            finished(3, true),
            finished(2, false),
        ];

        let mut aggregator = ProgressAggregator::new(4);
        for event in &events {
            let p = aggregator.apply(event);
            assert_eq!(p.completed, p.successful + p.failed);
            assert!(p.completed <= p.total);
            assert!(p.running <= p.total - p.completed);
        }
    }

    #[test]
    fn test_replay_matches_incremental() {
        let events = vec![started(0), started(1), finished(0, true), finished(1, false)];
        let mut aggregator = ProgressAggregator::new(2);
        for event in &events {
            aggregator.apply(event);
        }
        assert_eq!(ProgressAggregator::replay(2, &events), aggregator.snapshot());
    }
}
