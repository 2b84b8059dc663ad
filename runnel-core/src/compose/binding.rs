//! Pre-bound call options.

use crate::config::{BatchCallOptions, BatchOptions, CallOptions};
use crate::runnable::{BoxRunnable, RunStream, Runnable};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Wraps a runnable with options captured at construction.
///
/// Every call merges the caller's options over the bound ones: bound config
/// values act as defaults the caller can override, bound kwargs are fixed.
/// The binding is transparent to observers: it reports no run of its own and
/// the bound runnable's run sees the merged options directly.
pub struct RunnableBinding<I, O> {
    bound: BoxRunnable<I, O>,
    options: CallOptions,
}

impl<I, O> RunnableBinding<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new(runnable: impl Runnable<I, O>, options: CallOptions) -> Self {
        Self {
            bound: Arc::new(runnable),
            options,
        }
    }

    /// The options captured at construction
    pub fn bound_options(&self) -> &CallOptions {
        &self.options
    }

    /// Bind further options on top of the existing ones
    pub fn bind(self, options: CallOptions) -> Self {
        let merged = options.merged_over(&self.options);
        Self {
            bound: self.bound,
            options: merged,
        }
    }

    fn merge(&self, options: CallOptions) -> CallOptions {
        options.merged_over(&self.options)
    }
}

#[async_trait]
impl<I, O> Runnable<I, O> for RunnableBinding<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> String {
        self.bound.name()
    }

    async fn run(&self, input: I, options: CallOptions) -> Result<O> {
        self.bound.run(input, self.merge(options)).await
    }

    fn streams_natively(&self) -> bool {
        self.bound.streams_natively()
    }

    async fn run_stream(&self, input: I, options: CallOptions) -> Result<RunStream<O>> {
        self.bound.run_stream(input, self.merge(options)).await
    }

    async fn invoke(&self, input: I, options: CallOptions) -> Result<O> {
        self.bound.invoke(input, self.merge(options)).await
    }

    async fn batch(
        &self,
        inputs: Vec<I>,
        options: BatchCallOptions,
        batch_options: BatchOptions,
    ) -> Result<Vec<Result<O>>> {
        let options = options
            .resolve(inputs.len())?
            .into_iter()
            .map(|o| self.merge(o))
            .collect::<Vec<_>>();
        self.bound.batch(inputs, options.into(), batch_options).await
    }

    async fn stream(&self, input: I, options: CallOptions) -> Result<RunStream<O>> {
        self.bound.stream(input, self.merge(options)).await
    }
}
