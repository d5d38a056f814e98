//! In-memory session store, one session per run.
//!
//! The run map sits behind a read/write lock and every session behind its
//! own mutex, so writers to different runs never contend and writers to the
//! same run are applied one at a time.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{Endpoint, ProbeResult, Progress};

/// State of one run
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub endpoints: Vec<Endpoint>,
    pub results: Vec<ProbeResult>,
    pub progress: Progress,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn new(id: Uuid, endpoints: Vec<Endpoint>) -> Self {
        let progress = Progress::new(endpoints.len());
        Self { id, endpoints, results: Vec::new(), progress, created_at: Utc::now() }
    }

    /// Replace the result with the same id, or append it
    pub fn upsert(&mut self, result: ProbeResult) {
        match self.results.iter_mut().find(|r| r.id == result.id) {
            Some(existing) => *existing = result,
            None => self.results.push(result),
        }
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot { results: self.results.clone(), progress: self.progress }
    }
}

/// What a poller sees of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub results: Vec<ProbeResult>,
    pub progress: Progress,
}

/// Sessions keyed by run id
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a run for `endpoints` and return its id
    pub async fn create(&self, endpoints: Vec<Endpoint>) -> Uuid {
        let id = Uuid::new_v4();
        let session = Session::new(id, endpoints);
        debug!(run_id = %id, total = session.progress.total, "Session created");
        self.sessions.write().await.insert(id, Arc::new(Mutex::new(session)));
        id
    }

    /// Current results and progress, `None` for an unknown run
    pub async fn get(&self, run_id: Uuid) -> Option<RunSnapshot> {
        let session = self.session(run_id).await?;
        let snapshot = session.lock().await.snapshot();
        Some(snapshot)
    }

    pub async fn upsert_result(&self, run_id: Uuid, result: ProbeResult) -> Result<(), StoreError> {
        self.update(run_id, |session| session.upsert(result)).await
    }

    pub async fn set_progress(&self, run_id: Uuid, progress: Progress) -> Result<(), StoreError> {
        self.update(run_id, |session| session.progress = progress).await
    }

    /// Apply `f` to the session while holding its lock
    pub async fn update<F, T>(&self, run_id: Uuid, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Session) -> T,
    {
        let session = self.session(run_id).await.ok_or(StoreError::RunNotFound(run_id))?;
        let mut guard = session.lock().await;
        Ok(f(&mut guard))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop completed runs created before `cutoff`; returns how many went
    pub async fn evict_completed_before(&self, cutoff: DateTime<Utc>) -> usize {
        let candidates: Vec<(Uuid, Arc<Mutex<Session>>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, session)| (*id, session.clone()))
            .collect();

        let mut expired = Vec::new();
        for (id, session) in candidates {
            let session = session.lock().await;
            if session.created_at < cutoff && session.progress.is_complete() {
                expired.push(id);
            }
        }

        if expired.is_empty() {
            return 0;
        }

        let mut sessions = self.sessions.write().await;
        expired.iter().filter(|id| sessions.remove(id).is_some()).count()
    }

    async fn session(&self, run_id: Uuid) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(&run_id).cloned()
    }
}
