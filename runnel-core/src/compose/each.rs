//! Element-wise application over a sequence.

use crate::config::CallOptions;
use crate::runnable::{BoxRunnable, Runnable};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Applies one runnable to every element of the input independently.
///
/// Elements run through the inner runnable's batch path, so
/// `max_concurrency` bounds the fan-out and output order matches input
/// order.
pub struct RunnableEach<I, O> {
    inner: BoxRunnable<I, O>,
}

impl<I, O> RunnableEach<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new(inner: impl Runnable<I, O>) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

#[async_trait]
impl<I, O> Runnable<Vec<I>, Vec<O>> for RunnableEach<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> String {
        format!("RunnableEach<{}>", self.inner.name())
    }

    async fn run(&self, inputs: Vec<I>, options: CallOptions) -> Result<Vec<O>> {
        self.inner.batch_outputs(inputs, options.into()).await
    }
}
