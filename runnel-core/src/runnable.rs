//! The runnable contract and its lifecycle.

use crate::callback::{CallbackManager, RunInfo};
use crate::compose::{RunnableBinding, RunnableEach, RunnableSequence};
use crate::config::{BatchCallOptions, BatchOptions, CallOptions, RunnableConfig};
use crate::error::RunnableError;
use crate::layer::Layer;
use crate::runtime::{cancellable, guarded, BatchExecutor, TimeoutScope};
use crate::types::Concat;
use crate::Result;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Lazily produced output increments
pub type RunStream<O> = Pin<Box<dyn Stream<Item = Result<O>> + Send>>;

/// Type-erased runnable that can be shared across threads
pub type BoxRunnable<I, O> = Arc<dyn Runnable<I, O>>;

/// A composable unit of work.
///
/// Implementors only provide [`Runnable::run`]; [`Runnable::invoke`],
/// [`Runnable::batch`] and [`Runnable::stream`] wrap it with the run
/// lifecycle: a start notification, cancellation and timeout handling, then
/// exactly one end or error notification. Implementations hold no mutable
/// state between calls and must be safe to invoke concurrently.
#[async_trait]
pub trait Runnable<I, O>: Send + Sync + 'static
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Name reported to observers
    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Execute once, end to end.
    ///
    /// `options.config` is already scoped to this run; pass it (or a child
    /// derived from it) to any inner runnable.
    async fn run(&self, input: I, options: CallOptions) -> Result<O>;

    /// Whether [`Runnable::run_stream`] produces output incrementally
    fn streams_natively(&self) -> bool {
        false
    }

    /// Produce output incrementally. Only consulted when
    /// [`Runnable::streams_natively`] returns true.
    async fn run_stream(&self, input: I, options: CallOptions) -> Result<RunStream<O>> {
        let output = self.run(input, options).await?;
        Ok(single_chunk(output))
    }

    /// Run once with the full lifecycle
    async fn invoke(&self, input: I, options: CallOptions) -> Result<O> {
        let (scope, options) = RunScope::start(self.name(), options).await;
        let signal = options.config.signal.clone();
        let result = guarded(signal.as_ref(), self.run(input, options)).await;
        scope.finish(result).await
    }

    /// Run every input, concurrently up to the configured limit.
    ///
    /// Outputs are in input order. Without `return_exceptions` the first
    /// failure is returned as `Err`; with it, every slot carries its own
    /// result.
    async fn batch(
        &self,
        inputs: Vec<I>,
        options: BatchCallOptions,
        batch_options: BatchOptions,
    ) -> Result<Vec<Result<O>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let executor = BatchExecutor::from_options(&options, &batch_options);
        let options = options.resolve(inputs.len())?;
        executor
            .execute(inputs, options, |input, options| self.invoke(input, options))
            .await
    }

    /// Batch that fails on the first error and returns bare outputs
    async fn batch_outputs(&self, inputs: Vec<I>, options: BatchCallOptions) -> Result<Vec<O>> {
        self.batch(inputs, options, BatchOptions::default())
            .await?
            .into_iter()
            .collect()
    }

    /// Stream output with the full lifecycle.
    ///
    /// Runnables without native streaming yield their `run` output as a
    /// single chunk. Dropping the stream before it ends counts as a
    /// cancellation: observers receive an error notification with
    /// [`RunnableError::Cancelled`].
    async fn stream(&self, input: I, options: CallOptions) -> Result<RunStream<O>> {
        let (scope, options) = RunScope::start(self.name(), options).await;
        let signal = options.config.signal.clone();

        let opened = if self.streams_natively() {
            guarded(signal.as_ref(), self.run_stream(input, options)).await
        } else {
            guarded(signal.as_ref(), self.run(input, options))
                .await
                .map(single_chunk)
        };

        match opened {
            Ok(stream) => Ok(scope.observe(cancellable(stream, signal))),
            Err(e) => scope.finish(Err(e)).await,
        }
    }
}

#[async_trait]
impl<I, O, R> Runnable<I, O> for Arc<R>
where
    I: Send + 'static,
    O: Send + 'static,
    R: Runnable<I, O> + ?Sized,
{
    fn name(&self) -> String {
        (**self).name()
    }

    async fn run(&self, input: I, options: CallOptions) -> Result<O> {
        (**self).run(input, options).await
    }

    fn streams_natively(&self) -> bool {
        (**self).streams_natively()
    }

    async fn run_stream(&self, input: I, options: CallOptions) -> Result<RunStream<O>> {
        (**self).run_stream(input, options).await
    }

    async fn invoke(&self, input: I, options: CallOptions) -> Result<O> {
        (**self).invoke(input, options).await
    }

    async fn batch(
        &self,
        inputs: Vec<I>,
        options: BatchCallOptions,
        batch_options: BatchOptions,
    ) -> Result<Vec<Result<O>>> {
        (**self).batch(inputs, options, batch_options).await
    }

    async fn batch_outputs(&self, inputs: Vec<I>, options: BatchCallOptions) -> Result<Vec<O>> {
        (**self).batch_outputs(inputs, options).await
    }

    async fn stream(&self, input: I, options: CallOptions) -> Result<RunStream<O>> {
        (**self).stream(input, options).await
    }
}

/// Wrap one value as a single-chunk stream
pub fn single_chunk<O: Send + 'static>(output: O) -> RunStream<O> {
    Box::pin(futures::stream::once(async move { Ok(output) }))
}

/// Fold a stream into one value by concatenating its chunks in order.
///
/// Returns `None` for an empty stream.
pub async fn concat_stream<O: Concat>(mut stream: RunStream<O>) -> Result<Option<O>> {
    let mut acc: Option<O> = None;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        acc = Some(match acc {
            Some(prev) => prev.concat(chunk)?,
            None => chunk,
        });
    }
    Ok(acc)
}

/// Drain a stream into its chunks
pub async fn collect_stream<O>(mut stream: RunStream<O>) -> Result<Vec<O>> {
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk?);
    }
    Ok(chunks)
}

fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Lifecycle bookkeeping for one run.
///
/// Created by [`RunScope::start`], which fires the start notification and
/// scopes the options to the new run; consumed by [`RunScope::finish`] or
/// [`RunScope::observe`], which fire the terminal notification.
pub struct RunScope {
    run: RunInfo,
    manager: CallbackManager,
    timeout: Option<TimeoutScope>,
}

impl RunScope {
    /// Begin a run named `name`
    pub async fn start(name: String, options: CallOptions) -> (Self, CallOptions) {
        let (mut config, kwargs) = options.split();
        let timeout = TimeoutScope::arm(&mut config);
        let run = RunInfo::new(name, &config);
        let manager = CallbackManager::from_config(&config);

        manager.on_run_start(&run).await;

        let options = CallOptions {
            config: config.for_run(run.run_id),
            kwargs,
        };
        (
            Self {
                run,
                manager,
                timeout,
            },
            options,
        )
    }

    /// Fire the terminal notification for `result` and hand it back
    pub async fn finish<T>(self, result: Result<T>) -> Result<T> {
        match result {
            Ok(output) => {
                self.manager.on_run_end(&self.run).await;
                Ok(output)
            }
            Err(e) => {
                let e = match &self.timeout {
                    Some(timeout) => timeout.classify(e),
                    None => e,
                };
                self.manager.on_run_error(&self.run, &e).await;
                Err(e)
            }
        }
    }

    /// Forward `stream`, firing the terminal notification when it ends.
    ///
    /// The stream stops after its first error. A stream dropped before it
    /// ends reports [`RunnableError::Cancelled`] to observers.
    pub fn observe<O: Send + 'static>(self, mut stream: RunStream<O>) -> RunStream<O> {
        let mut pending = PendingFinish(Some(self));
        Box::pin(async_stream::stream! {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(chunk) => yield Ok(chunk),
                    Err(e) => {
                        match pending.take() {
                            Some(scope) => {
                                let result: Result<()> = scope.finish(Err(e)).await;
                                if let Err(e) = result {
                                    yield Err(e);
                                }
                            }
                            None => yield Err(e),
                        }
                        return;
                    }
                }
            }
            if let Some(scope) = pending.take() {
                let _ = scope.finish(Ok(())).await;
            }
        })
    }
}

/// Holds a stream's scope until its terminal notification has fired.
struct PendingFinish(Option<RunScope>);

impl PendingFinish {
    fn take(&mut self) -> Option<RunScope> {
        self.0.take()
    }
}

impl Drop for PendingFinish {
    fn drop(&mut self) {
        let Some(scope) = self.0.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _: Result<()> = scope.finish(Err(RunnableError::Cancelled)).await;
                });
            }
            Err(_) => tracing::warn!(
                "stream for run {} dropped outside a runtime, observers were not notified",
                scope.run.name
            ),
        }
    }
}

/// Builder-style composition available on every runnable
pub trait RunnableExt<I, O>: Runnable<I, O> + Sized
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Feed this runnable's output into `next`
    fn pipe<P, N>(self, next: N) -> RunnableSequence<I, O, P>
    where
        P: Send + 'static,
        N: Runnable<O, P>,
    {
        RunnableSequence::new(self, next)
    }

    /// Pre-bind call options; caller config wins, bound kwargs are fixed
    fn bind(self, options: CallOptions) -> RunnableBinding<I, O> {
        RunnableBinding::new(self, options)
    }

    /// Pre-bind config defaults
    fn with_config(self, config: RunnableConfig) -> RunnableBinding<I, O> {
        RunnableBinding::new(self, config.into())
    }

    /// Apply this runnable to every element of a sequence
    fn each(self) -> RunnableEach<I, O> {
        RunnableEach::new(self)
    }

    /// Wrap with a layer
    fn layer<L>(self, layer: L) -> L::Layered
    where
        L: Layer<I, O, Self>,
    {
        layer.layer(self)
    }

    /// Erase the concrete type
    fn boxed(self) -> BoxRunnable<I, O> {
        Arc::new(self)
    }
}

impl<I, O, R> RunnableExt<I, O> for R
where
    I: Send + 'static,
    O: Send + 'static,
    R: Runnable<I, O>,
{
}

/// Shorthand for a config carrying only a cancellation signal
pub fn cancellable_config(signal: CancellationToken) -> RunnableConfig {
    RunnableConfig::new().with_signal(signal)
}
