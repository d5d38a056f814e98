//! Eviction of finished runs from the session store.
//!
//! A run is evicted once it is complete and older than the TTL. Runs still
//! in progress are kept; their lifetime is bounded by the probe timeouts.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::RetentionConfig;
use crate::store::SessionStore;

/// How long finished runs stay pollable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Age after which a completed run is evicted
    pub ttl: Duration,
    /// Time between sweeps
    pub sweep_interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { ttl: Duration::from_secs(3600), sweep_interval: Duration::from_secs(60) }
    }
}

impl From<&RetentionConfig> for RetentionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.ttl_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
        }
    }
}

/// Periodic sweeper over a session store
pub struct RetentionSweeper {
    store: Arc<SessionStore>,
    policy: RetentionPolicy,
}

impl RetentionSweeper {
    pub fn new(store: Arc<SessionStore>, policy: RetentionPolicy) -> Self {
        Self { store, policy }
    }

    /// Evict expired runs once, returning how many were dropped
    pub async fn sweep(&self) -> usize {
        let cutoff = chrono::Duration::from_std(self.policy.ttl)
            .ok()
            .and_then(|ttl| chrono::Utc::now().checked_sub_signed(ttl))
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);
        self.store.evict_completed_before(cutoff).await
    }

    /// Start background sweeping every `sweep_interval`
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.policy.sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let evicted = self.sweep().await;
                if evicted > 0 {
                    info!("Retention sweep evicted {} finished runs", evicted);
                } else {
                    debug!("Retention sweep found nothing to evict");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Endpoint, Progress};

    async fn finished_run(store: &SessionStore) -> uuid::Uuid {
        let id = store.create(vec![Endpoint::new("Swisscom", "Switzerland")]).await;
        let mut progress = Progress::new(1);
        progress.completed = 1;
        progress.failed = 1;
        store.set_progress(id, progress).await.unwrap();
        id
    }

    #[test]
    fn test_retention_policy_defaults() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.ttl, Duration::from_secs(3600));
        assert_eq!(policy.sweep_interval, Duration::from_secs(60));
        assert_eq!(RetentionPolicy::from(&RetentionConfig::default()), policy);
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_runs() {
        let store = Arc::new(SessionStore::new());
        let id = finished_run(&store).await;

        let sweeper = RetentionSweeper::new(store.clone(), RetentionPolicy::default());
        assert_eq!(sweeper.sweep().await, 0);
        assert!(store.get(id).await.is_some());
    }

    #[tokio::test]
    async fn test_sweep_evicts_expired_completed_runs() {
        let store = Arc::new(SessionStore::new());
        let done = finished_run(&store).await;
        let running = store.create(vec![Endpoint::new("Turkcell", "Turkey")]).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let policy = RetentionPolicy { ttl: Duration::ZERO, sweep_interval: Duration::from_secs(1) };
        let sweeper = RetentionSweeper::new(store.clone(), policy);

        assert_eq!(sweeper.sweep().await, 1);
        assert!(store.get(done).await.is_none());
        assert!(store.get(running).await.is_some());
    }
}
