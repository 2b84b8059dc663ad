//! Logging layer for runnable operations.

use async_trait::async_trait;
use runnel_core::config::{BatchCallOptions, BatchOptions, CallOptions};
use runnel_core::layer::Layer;
use runnel_core::runnable::{RunStream, Runnable};
use runnel_core::Result;
use std::fmt::Debug;
use std::time::Instant;

/// Logging layer that logs runnable operations.
#[derive(Debug, Clone)]
pub struct LoggingLayer {
    prefix: String,
}

impl LoggingLayer {
    /// Create a new logging layer
    pub fn new() -> Self {
        Self {
            prefix: "[Runnel]".to_string(),
        }
    }

    /// Create a logging layer with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O, R> Layer<I, O, R> for LoggingLayer
where
    I: Send + 'static,
    O: Send + 'static,
    R: Runnable<I, O>,
{
    type Layered = RunnableLogging<R>;

    fn layer(&self, inner: R) -> Self::Layered {
        RunnableLogging {
            inner,
            prefix: self.prefix.clone(),
        }
    }
}

/// Runnable wrapped with logging.
///
/// Transparent to observers: the inner runnable's lifecycle is the only one
/// reported.
#[derive(Debug)]
pub struct RunnableLogging<R> {
    inner: R,
    prefix: String,
}

impl<R> RunnableLogging<R> {
    fn report<T>(&self, operation: &str, name: &str, result: &Result<T>, start: Instant) {
        let elapsed = start.elapsed();
        match result {
            Ok(_) => {
                tracing::debug!(
                    "{} {} {} success, elapsed={:?}",
                    self.prefix,
                    name,
                    operation,
                    elapsed
                );
            }
            Err(e) => {
                tracing::error!(
                    "{} {} {} error: {}, elapsed={:?}",
                    self.prefix,
                    name,
                    operation,
                    e,
                    elapsed
                );
            }
        }
    }
}

#[async_trait]
impl<I, O, R> Runnable<I, O> for RunnableLogging<R>
where
    I: Send + 'static,
    O: Send + 'static,
    R: Runnable<I, O>,
{
    fn name(&self) -> String {
        self.inner.name()
    }

    async fn run(&self, input: I, options: CallOptions) -> Result<O> {
        self.inner.run(input, options).await
    }

    fn streams_natively(&self) -> bool {
        self.inner.streams_natively()
    }

    async fn run_stream(&self, input: I, options: CallOptions) -> Result<RunStream<O>> {
        self.inner.run_stream(input, options).await
    }

    async fn invoke(&self, input: I, options: CallOptions) -> Result<O> {
        let name = self.inner.name();
        tracing::debug!(
            "{} {} invoke request: tags={:?}",
            self.prefix,
            name,
            options.config.tags
        );

        let start = Instant::now();
        let result = self.inner.invoke(input, options).await;
        self.report("invoke", &name, &result, start);
        result
    }

    async fn batch(
        &self,
        inputs: Vec<I>,
        options: BatchCallOptions,
        batch_options: BatchOptions,
    ) -> Result<Vec<Result<O>>> {
        let name = self.inner.name();
        tracing::debug!(
            "{} {} batch request: inputs={}, return_exceptions={}",
            self.prefix,
            name,
            inputs.len(),
            batch_options.return_exceptions
        );

        let start = Instant::now();
        let result = self.inner.batch(inputs, options, batch_options).await;
        if let Ok(results) = &result {
            let failed = results.iter().filter(|r| r.is_err()).count();
            if failed > 0 {
                tracing::warn!("{} {} batch had {} failed item(s)", self.prefix, name, failed);
            }
        }
        self.report("batch", &name, &result, start);
        result
    }

    async fn stream(&self, input: I, options: CallOptions) -> Result<RunStream<O>> {
        let name = self.inner.name();
        tracing::debug!(
            "{} {} stream request: tags={:?}",
            self.prefix,
            name,
            options.config.tags
        );

        let start = Instant::now();
        let result = self.inner.stream(input, options).await;
        self.report("stream", &name, &result, start);
        result
    }
}
