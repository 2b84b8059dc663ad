//! Observer that reports run lifecycle events through `tracing`.

use async_trait::async_trait;
use dashmap::DashMap;
use runnel_core::callback::{Callback, RunInfo};
use runnel_core::error::RunnableError;
use runnel_core::Result;
use std::time::Instant;
use uuid::Uuid;

/// Logs every run start, end, error and retry.
///
/// Starts and ends are logged at debug level, errors and retries at warn.
#[derive(Debug, Default)]
pub struct TracingCallback {
    prefix: String,
    started: DashMap<Uuid, Instant>,
}

impl TracingCallback {
    /// Create a new tracing callback
    pub fn new() -> Self {
        Self::with_prefix("[Runnel]")
    }

    /// Create a tracing callback with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            started: DashMap::new(),
        }
    }

    fn elapsed(&self, run: &RunInfo) -> Option<std::time::Duration> {
        self.started
            .remove(&run.run_id)
            .map(|(_, start)| start.elapsed())
    }
}

#[async_trait]
impl Callback for TracingCallback {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn on_run_start(&self, run: &RunInfo) -> Result<()> {
        self.started.insert(run.run_id, Instant::now());
        tracing::debug!(
            run_id = %run.run_id,
            parent_run_id = ?run.parent_run_id,
            tags = ?run.tags,
            "{} {} started",
            self.prefix,
            run.name
        );
        Ok(())
    }

    async fn on_run_end(&self, run: &RunInfo) -> Result<()> {
        let elapsed = self.elapsed(run);
        tracing::debug!(
            run_id = %run.run_id,
            "{} {} finished, elapsed={:?}",
            self.prefix,
            run.name,
            elapsed
        );
        Ok(())
    }

    async fn on_run_error(&self, run: &RunInfo, error: &RunnableError) -> Result<()> {
        let elapsed = self.elapsed(run);
        tracing::warn!(
            run_id = %run.run_id,
            "{} {} failed: {}, elapsed={:?}",
            self.prefix,
            run.name,
            error,
            elapsed
        );
        Ok(())
    }

    async fn on_retry(&self, run: &RunInfo, attempt: u32, error: &RunnableError) -> Result<()> {
        tracing::warn!(
            run_id = %run.run_id,
            "{} {} retrying after attempt {}: {}",
            self.prefix,
            run.name,
            attempt,
            error
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runnel_core::{CallOptions, Runnable, RunnableConfig, RunnableLambda};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_start_times_are_released() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();

        let tracer = Arc::new(TracingCallback::new());
        let options: CallOptions = RunnableConfig::new().with_callback(tracer.clone()).into();

        let ok = RunnableLambda::from_fn("ok", |x: i32| Ok(x));
        let bad = RunnableLambda::from_fn("bad", |_: i32| -> Result<i32> {
            Err(RunnableError::stage("boom"))
        });

        ok.invoke(1, options.clone()).await.unwrap();
        bad.invoke(1, options).await.unwrap_err();
        assert!(tracer.started.is_empty());
    }
}
