//! Observer that keeps an in-memory record of every run.

use async_trait::async_trait;
use runnel_core::callback::{Callback, RunInfo};
use runnel_core::error::RunnableError;
use runnel_core::Result;
use std::sync::Mutex;
use uuid::Uuid;

/// Outcome of a recorded run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed(String),
}

/// One recorded run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub parent_run_id: Option<Uuid>,
    pub name: String,
    pub tags: Vec<String>,
    pub status: RunStatus,
    pub retries: u32,
}

/// Collects runs in start order, building the run tree of a call.
#[derive(Debug, Default)]
pub struct RunCollector {
    runs: Mutex<Vec<RunRecord>>,
}

impl RunCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded run, in start order
    pub fn runs(&self) -> Vec<RunRecord> {
        self.lock().clone()
    }

    /// First run recorded under `name`
    pub fn find(&self, name: &str) -> Option<RunRecord> {
        self.lock().iter().find(|r| r.name == name).cloned()
    }

    /// Runs started directly under `run_id`
    pub fn children(&self, run_id: Uuid) -> Vec<RunRecord> {
        self.lock()
            .iter()
            .filter(|r| r.parent_run_id == Some(run_id))
            .cloned()
            .collect()
    }

    /// Runs with no recorded parent
    pub fn roots(&self) -> Vec<RunRecord> {
        self.lock()
            .iter()
            .filter(|r| r.parent_run_id.is_none())
            .cloned()
            .collect()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RunRecord>> {
        // a panicking observer must not take the collector down with it
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, run_id: Uuid, apply: impl FnOnce(&mut RunRecord)) {
        if let Some(record) = self.lock().iter_mut().rev().find(|r| r.run_id == run_id) {
            apply(record);
        }
    }
}

#[async_trait]
impl Callback for RunCollector {
    fn name(&self) -> &str {
        "run-collector"
    }

    async fn on_run_start(&self, run: &RunInfo) -> Result<()> {
        self.lock().push(RunRecord {
            run_id: run.run_id,
            parent_run_id: run.parent_run_id,
            name: run.name.clone(),
            tags: run.tags.clone(),
            status: RunStatus::Running,
            retries: 0,
        });
        Ok(())
    }

    async fn on_run_end(&self, run: &RunInfo) -> Result<()> {
        self.update(run.run_id, |r| r.status = RunStatus::Succeeded);
        Ok(())
    }

    async fn on_run_error(&self, run: &RunInfo, error: &RunnableError) -> Result<()> {
        let message = error.to_string();
        self.update(run.run_id, |r| r.status = RunStatus::Failed(message));
        Ok(())
    }

    async fn on_retry(&self, run: &RunInfo, _attempt: u32, _error: &RunnableError) -> Result<()> {
        self.update(run.run_id, |r| r.retries += 1);
        Ok(())
    }
}
