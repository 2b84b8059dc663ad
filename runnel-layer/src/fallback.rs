//! Fallback layer: try alternates in order when the primary fails.

use async_trait::async_trait;
use runnel_core::config::CallOptions;
use runnel_core::error::RunnableError;
use runnel_core::layer::Layer;
use runnel_core::runnable::{BoxRunnable, RunStream, Runnable};
use runnel_core::Result;
use std::future::Future;
use std::sync::Arc;

/// Fallback layer holding the ordered alternates
pub struct FallbackLayer<I, O> {
    fallbacks: Vec<BoxRunnable<I, O>>,
}

impl<I, O> FallbackLayer<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Create a layer trying `fallbacks` in order
    pub fn new(fallbacks: Vec<BoxRunnable<I, O>>) -> Self {
        Self { fallbacks }
    }

    /// Append one more alternate
    pub fn with_fallback(mut self, fallback: impl Runnable<I, O>) -> Self {
        self.fallbacks.push(Arc::new(fallback));
        self
    }
}

impl<I, O> Clone for FallbackLayer<I, O> {
    fn clone(&self) -> Self {
        Self {
            fallbacks: self.fallbacks.clone(),
        }
    }
}

impl<I, O, R> Layer<I, O, R> for FallbackLayer<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
    R: Runnable<I, O>,
{
    type Layered = RunnableWithFallbacks<I, O>;

    fn layer(&self, inner: R) -> Self::Layered {
        RunnableWithFallbacks {
            primary: Arc::new(inner),
            fallbacks: self.fallbacks.clone(),
        }
    }
}

/// Runnable that falls back to alternates on failure.
///
/// When every candidate fails the result is [`RunnableError::Fallbacks`] with
/// the errors in attempted order. Batches run the full chain per failed item.
pub struct RunnableWithFallbacks<I, O> {
    primary: BoxRunnable<I, O>,
    fallbacks: Vec<BoxRunnable<I, O>>,
}

impl<I, O> RunnableWithFallbacks<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    pub fn new(primary: impl Runnable<I, O>, fallbacks: Vec<BoxRunnable<I, O>>) -> Self {
        Self {
            primary: Arc::new(primary),
            fallbacks,
        }
    }

    fn candidates(&self) -> Vec<(BoxRunnable<I, O>, Option<usize>)> {
        std::iter::once((self.primary.clone(), None))
            .chain(
                self.fallbacks
                    .iter()
                    .enumerate()
                    .map(|(i, f)| (f.clone(), Some(i + 1))),
            )
            .collect()
    }

    async fn first_success<T, F, Fut>(&self, options: &CallOptions, mut attempt: F) -> Result<T>
    where
        F: FnMut(BoxRunnable<I, O>, CallOptions) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut errors = Vec::new();

        for (candidate, position) in self.candidates() {
            let candidate_options = match position {
                None => options.clone(),
                Some(n) => options.child_with_tag(format!("fallback:{}", n)),
            };
            let name = candidate.name();
            match attempt(candidate, candidate_options).await {
                Ok(output) => return Ok(output),
                Err(RunnableError::Cancelled) => return Err(RunnableError::Cancelled),
                Err(e) => {
                    tracing::debug!("{} failed, trying next fallback: {}", name, e);
                    errors.push(e);
                }
            }
        }

        Err(RunnableError::Fallbacks(errors))
    }
}

#[async_trait]
impl<I, O> Runnable<I, O> for RunnableWithFallbacks<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    fn name(&self) -> String {
        format!("RunnableWithFallbacks<{}>", self.primary.name())
    }

    async fn run(&self, input: I, options: CallOptions) -> Result<O> {
        self.first_success(&options, |candidate, options| {
            let input = input.clone();
            async move { candidate.invoke(input, options).await }
        })
        .await
    }

    fn streams_natively(&self) -> bool {
        true
    }

    /// Falls back only while opening the stream; once chunks flow, errors
    /// are forwarded.
    async fn run_stream(&self, input: I, options: CallOptions) -> Result<RunStream<O>> {
        self.first_success(&options, |candidate, options| {
            let input = input.clone();
            async move { candidate.stream(input, options).await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runnel_core::config::BatchOptions;
    use runnel_core::runnable::RunnableExt;
    use runnel_core::RunnableLambda;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn failing(name: &'static str) -> RunnableLambda<String, String> {
        RunnableLambda::from_fn(name, move |_: String| Err(RunnableError::stage(name)))
    }

    fn answering(name: &'static str) -> RunnableLambda<String, String> {
        RunnableLambda::from_fn(name, move |input: String| Ok(format!("{}:{}", name, input)))
    }

    #[tokio::test]
    async fn test_returns_first_successful_fallback() {
        let chain = failing("primary").layer(
            FallbackLayer::new(Vec::new())
                .with_fallback(failing("f1"))
                .with_fallback(answering("f2")),
        );

        let output = chain.invoke("q".to_string(), CallOptions::new()).await.unwrap();
        assert_eq!(output, "f2:q");
    }

    #[tokio::test]
    async fn test_all_failing_reports_every_error_in_order() {
        let chain = failing("primary").layer(
            FallbackLayer::new(Vec::new())
                .with_fallback(failing("f1"))
                .with_fallback(failing("f2")),
        );

        let err = chain.invoke("q".to_string(), CallOptions::new()).await.unwrap_err();
        let RunnableError::Fallbacks(errors) = err else {
            panic!("expected aggregate error, got {:?}", err);
        };
        let names: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            names,
            vec!["Stage error: primary", "Stage error: f1", "Stage error: f2"]
        );
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallbacks() {
        let fallback_calls = Arc::new(AtomicUsize::new(0));
        let counter = fallback_calls.clone();
        let fallback = RunnableLambda::from_fn("backup", move |s: String| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(s)
        });

        let chain = RunnableWithFallbacks::new(answering("main"), vec![fallback.boxed()]);
        let output = chain.invoke("x".to_string(), CallOptions::new()).await.unwrap();
        assert_eq!(output, "main:x");
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_applies_chain_per_item() {
        let picky = RunnableLambda::from_fn("picky", |s: String| {
            if s.starts_with('a') {
                Ok(format!("picky:{}", s))
            } else {
                Err(RunnableError::stage("not for me"))
            }
        });
        let chain = RunnableWithFallbacks::new(picky, vec![answering("backup").boxed()]);

        let results = chain
            .batch(
                vec!["apple".to_string(), "berry".to_string(), "avocado".to_string()],
                CallOptions::new().into(),
                BatchOptions::new(),
            )
            .await
            .unwrap();
        let outputs: Vec<String> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(outputs, vec!["picky:apple", "backup:berry", "picky:avocado"]);
    }
}
