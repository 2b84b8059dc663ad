//! Sequential composition.

use super::step_options;
use crate::config::CallOptions;
use crate::runnable::{BoxRunnable, RunStream, Runnable};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Runs `first`, then feeds its output to `last`.
///
/// Longer pipelines nest: `a.pipe(b).pipe(c)` is `Sequence(Sequence(a, b), c)`,
/// so steps always execute in declaration order. When streamed, every step
/// but the final one runs to completion and only the final step's output is
/// forwarded incrementally.
pub struct RunnableSequence<I, M, O> {
    first: BoxRunnable<I, M>,
    last: BoxRunnable<M, O>,
}

impl<I, M, O> RunnableSequence<I, M, O>
where
    I: Send + 'static,
    M: Send + 'static,
    O: Send + 'static,
{
    pub fn new(first: impl Runnable<I, M>, last: impl Runnable<M, O>) -> Self {
        Self {
            first: Arc::new(first),
            last: Arc::new(last),
        }
    }

    /// Compose two already type-erased runnables
    pub fn from_boxed(first: BoxRunnable<I, M>, last: BoxRunnable<M, O>) -> Self {
        Self { first, last }
    }
}

#[async_trait]
impl<I, M, O> Runnable<I, O> for RunnableSequence<I, M, O>
where
    I: Send + 'static,
    M: Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: I, options: CallOptions) -> Result<O> {
        let intermediate = self
            .first
            .invoke(input, step_options(&options, "seq:step:1"))
            .await?;
        options.config.check_cancelled()?;
        self.last
            .invoke(intermediate, step_options(&options, "seq:step:2"))
            .await
    }

    fn streams_natively(&self) -> bool {
        true
    }

    async fn run_stream(&self, input: I, options: CallOptions) -> Result<RunStream<O>> {
        let intermediate = self
            .first
            .invoke(input, step_options(&options, "seq:step:1"))
            .await?;
        options.config.check_cancelled()?;
        self.last
            .stream(intermediate, step_options(&options, "seq:step:2"))
            .await
    }
}
