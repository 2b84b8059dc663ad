//! Observer hooks fired around every run.

use crate::config::RunnableConfig;
use crate::error::RunnableError;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use uuid::Uuid;

/// Identity and context of a single run
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub run_id: Uuid,
    pub parent_run_id: Option<Uuid>,
    pub name: String,
    pub tags: Vec<String>,
    pub metadata: Arc<HashMap<String, Value>>,
}

impl RunInfo {
    /// Start a new run named `name` under `config`
    pub fn new(name: impl Into<String>, config: &RunnableConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            parent_run_id: config.parent_run_id(),
            name: config.run_name.clone().unwrap_or_else(|| name.into()),
            tags: config.tags.clone(),
            metadata: Arc::new(config.metadata.clone()),
        }
    }
}

/// Observer of run lifecycle events.
///
/// Every run emits `on_run_start` followed by exactly one of `on_run_end` or
/// `on_run_error`. Observers are local to the process and never cross a
/// remote boundary.
#[async_trait]
pub trait Callback: Send + Sync + Debug + 'static {
    /// Observer name
    fn name(&self) -> &str;

    /// A run is about to execute
    async fn on_run_start(&self, _run: &RunInfo) -> Result<()> {
        Ok(())
    }

    /// A run finished successfully
    async fn on_run_end(&self, _run: &RunInfo) -> Result<()> {
        Ok(())
    }

    /// A run failed; fires before the error reaches the caller
    async fn on_run_error(&self, _run: &RunInfo, _error: &RunnableError) -> Result<()> {
        Ok(())
    }

    /// A retry wrapper is about to re-attempt after `error`
    async fn on_retry(&self, _run: &RunInfo, _attempt: u32, _error: &RunnableError) -> Result<()> {
        Ok(())
    }
}

/// Fans lifecycle events out to every registered observer.
///
/// Observer failures are logged and never alter the outcome of the run.
#[derive(Debug, Clone, Default)]
pub struct CallbackManager {
    callbacks: Vec<Arc<dyn Callback>>,
}

impl CallbackManager {
    /// Create a manager from a list of observers
    pub fn new(callbacks: Vec<Arc<dyn Callback>>) -> Self {
        Self { callbacks }
    }

    /// Create a manager for the observers of `config`
    pub fn from_config(config: &RunnableConfig) -> Self {
        Self::new(config.callbacks.clone())
    }

    /// Get all observers
    pub fn callbacks(&self) -> &[Arc<dyn Callback>] {
        &self.callbacks
    }

    /// Whether there is nobody to notify
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub async fn on_run_start(&self, run: &RunInfo) {
        let futures = self
            .callbacks
            .iter()
            .map(|c| async move { (c.name(), c.on_run_start(run).await) });
        report("on_run_start", futures::future::join_all(futures).await);
    }

    pub async fn on_run_end(&self, run: &RunInfo) {
        let futures = self
            .callbacks
            .iter()
            .map(|c| async move { (c.name(), c.on_run_end(run).await) });
        report("on_run_end", futures::future::join_all(futures).await);
    }

    pub async fn on_run_error(&self, run: &RunInfo, error: &RunnableError) {
        let futures = self
            .callbacks
            .iter()
            .map(|c| async move { (c.name(), c.on_run_error(run, error).await) });
        report("on_run_error", futures::future::join_all(futures).await);
    }

    pub async fn on_retry(&self, run: &RunInfo, attempt: u32, error: &RunnableError) {
        let futures = self
            .callbacks
            .iter()
            .map(|c| async move { (c.name(), c.on_retry(run, attempt, error).await) });
        report("on_retry", futures::future::join_all(futures).await);
    }
}

fn report(hook: &str, results: Vec<(&str, Result<()>)>) {
    for (name, result) in results {
        if let Err(e) = result {
            tracing::warn!("callback {} failed in {}: {}", name, hook, e);
        }
    }
}
