//! Retry layer with exponential backoff.

use async_trait::async_trait;
use runnel_core::callback::{CallbackManager, RunInfo};
use runnel_core::config::CallOptions;
use runnel_core::error::RunnableError;
use runnel_core::layer::Layer;
use runnel_core::runnable::{collect_stream, RunStream, Runnable};
use runnel_core::runtime::guarded;
use runnel_core::Result;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

type RetryPredicate = Arc<dyn Fn(&RunnableError) -> bool + Send + Sync>;

/// Retry layer configuration.
///
/// By default only errors for which [`RunnableError::is_retryable`] holds are
/// retried: network failures, timeouts, rate limits and HTTP 408/429/5xx.
/// A plain [`RunnableError::Stage`] failure propagates on the first attempt;
/// use [`RetryLayer::with_retry_if`] to retry those too.
#[derive(Clone)]
pub struct RetryLayer {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    retry_if: RetryPredicate,
}

impl RetryLayer {
    /// Create a new retry layer with default settings
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            retry_if: Arc::new(RunnableError::is_retryable),
        }
    }

    /// Set the total number of attempts, the first one included
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set initial delay
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Set maximum delay
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Only retry errors accepted by `predicate`; others propagate at once
    pub fn with_retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RunnableError) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Arc::new(predicate);
        self
    }

    /// Calculate delay after the given failed attempt (0-based)
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }
}

impl Default for RetryLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for RetryLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryLayer")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .finish()
    }
}

impl<I, O, R> Layer<I, O, R> for RetryLayer
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
    R: Runnable<I, O>,
{
    type Layered = RunnableRetry<R>;

    fn layer(&self, inner: R) -> Self::Layered {
        RunnableRetry {
            inner,
            config: self.clone(),
        }
    }
}

/// Runnable wrapped with retry logic.
///
/// Batches retry each item on its own, never the whole batch.
#[derive(Debug)]
pub struct RunnableRetry<R> {
    inner: R,
    config: RetryLayer,
}

impl<R> RunnableRetry<R> {
    /// Execute with retry logic
    async fn execute_with_retry<T, F, Fut>(&self, name: String, options: &CallOptions, mut operation: F) -> Result<T>
    where
        F: FnMut(CallOptions) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let manager = CallbackManager::from_config(&options.config);
        let mut attempt = 0;

        loop {
            let attempt_options = options.child_with_tag(format!("retry:attempt:{}", attempt + 1));
            match operation(attempt_options).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if matches!(e, RunnableError::Cancelled) || !(self.config.retry_if)(&e) {
                        return Err(e);
                    }
                    attempt += 1;
                    if attempt >= self.config.max_attempts {
                        return Err(RunnableError::Retry {
                            attempts: attempt,
                            source: Box::new(e),
                        });
                    }

                    let delay = self.config.calculate_delay(attempt - 1);
                    tracing::debug!(
                        "Retry attempt {}/{} for {}, waiting {:?}: {}",
                        attempt + 1,
                        self.config.max_attempts,
                        name,
                        delay,
                        e
                    );
                    if !manager.is_empty() {
                        manager.on_retry(&retry_run(&name, options), attempt, &e).await;
                    }

                    let signal = options.config.signal.as_ref();
                    guarded(signal, async {
                        tokio::time::sleep(delay).await;
                        Ok(())
                    })
                    .await?;
                }
            }
        }
    }
}

fn retry_run(name: &str, options: &CallOptions) -> RunInfo {
    RunInfo {
        run_id: options.config.parent_run_id().unwrap_or_else(Uuid::new_v4),
        parent_run_id: None,
        name: name.to_string(),
        tags: options.config.tags.clone(),
        metadata: Arc::new(options.config.metadata.clone()),
    }
}

#[async_trait]
impl<I, O, R> Runnable<I, O> for RunnableRetry<R>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
    R: Runnable<I, O>,
{
    fn name(&self) -> String {
        format!("RunnableRetry<{}>", self.inner.name())
    }

    async fn run(&self, input: I, options: CallOptions) -> Result<O> {
        self.execute_with_retry(Runnable::<I, O>::name(self), &options, |attempt_options| {
            self.inner.invoke(input.clone(), attempt_options)
        })
        .await
    }

    fn streams_natively(&self) -> bool {
        true
    }

    /// A failure mid-stream restarts the whole stream, so chunks are
    /// buffered until an attempt completes.
    async fn run_stream(&self, input: I, options: CallOptions) -> Result<RunStream<O>> {
        let chunks = self
            .execute_with_retry(Runnable::<I, O>::name(self), &options, |attempt_options| {
                let input = input.clone();
                async move {
                    let stream = self.inner.stream(input, attempt_options).await?;
                    collect_stream(stream).await
                }
            })
            .await?;
        Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
    }
}
