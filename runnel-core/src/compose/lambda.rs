//! Ad hoc functions as runnables.

use crate::config::CallOptions;
use crate::runnable::Runnable;
use crate::Result;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type LambdaFn<I, O> =
    Arc<dyn Fn(I, CallOptions) -> Pin<Box<dyn Future<Output = Result<O>> + Send>> + Send + Sync>;

/// Wraps a function so it takes part in composition with the full run
/// lifecycle.
///
/// The function receives the call options scoped to its run, so any runnable
/// it calls internally nests under it.
pub struct RunnableLambda<I, O> {
    name: String,
    func: LambdaFn<I, O>,
}

impl<I, O> RunnableLambda<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Create a lambda from an async function
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(I, CallOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(move |input, options| Box::pin(func(input, options))),
        }
    }

    /// Create a lambda from a synchronous function
    pub fn from_fn<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(I) -> Result<O> + Send + Sync + 'static,
    {
        let func = Arc::new(func);
        Self::new(name, move |input, _options| {
            let func = func.clone();
            async move { func(input) }
        })
    }
}

impl<I, O> Clone for RunnableLambda<I, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: self.func.clone(),
        }
    }
}

impl<I, O> std::fmt::Debug for RunnableLambda<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnableLambda")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<I, O> Runnable<I, O> for RunnableLambda<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn run(&self, input: I, options: CallOptions) -> Result<O> {
        (self.func)(input, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunnableConfig;

    #[tokio::test]
    async fn test_async_lambda_sees_config() {
        let lambda = RunnableLambda::new("tagged", |input: String, options: CallOptions| async move {
            Ok(format!("{}:{}", input, options.config.tags.join(",")))
        });

        let options = RunnableConfig::new().with_tag("outer").into();
        let output = lambda.invoke("x".to_string(), options).await.unwrap();
        assert_eq!(output, "x:outer");
        assert_eq!(lambda.name(), "tagged");
    }

    #[tokio::test]
    async fn test_sync_lambda() {
        let lambda = RunnableLambda::from_fn("square", |x: i32| Ok(x * x));
        assert_eq!(lambda.invoke(7, CallOptions::new()).await.unwrap(), 49);
    }

    #[tokio::test]
    async fn test_lambda_sees_kwargs() {
        let lambda = RunnableLambda::new("stop", |_: (), options: CallOptions| async move {
            Ok(options.kwarg("stop").cloned())
        });
        let options = CallOptions::new().with_kwarg("stop", "END");
        let output = lambda.invoke((), options).await.unwrap();
        assert_eq!(output, Some(serde_json::json!("END")));
    }
}
