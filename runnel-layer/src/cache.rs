//! In-memory result cache keyed by input.

use async_trait::async_trait;
use dashmap::DashMap;
use runnel_core::config::CallOptions;
use runnel_core::layer::Layer;
use runnel_core::runnable::Runnable;
use runnel_core::Result;
use serde::Serialize;

/// Caches successful outputs per distinct input and kwargs.
///
/// Errors are never cached. Tags, metadata and other config values do not
/// take part in the key.
#[derive(Debug, Clone, Default)]
pub struct CacheLayer {
    max_entries: Option<usize>,
}

impl CacheLayer {
    /// Create an unbounded cache layer
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop inserting once `max_entries` outputs are cached
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }
}

impl<I, O, R> Layer<I, O, R> for CacheLayer
where
    I: Serialize + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
    R: Runnable<I, O>,
{
    type Layered = RunnableCache<R, O>;

    fn layer(&self, inner: R) -> Self::Layered {
        RunnableCache {
            inner,
            entries: DashMap::new(),
            max_entries: self.max_entries,
        }
    }
}

/// Runnable wrapped with a result cache
#[derive(Debug)]
pub struct RunnableCache<R, O> {
    inner: R,
    entries: DashMap<String, O>,
    max_entries: Option<usize>,
}

impl<R, O> RunnableCache<R, O> {
    /// Number of cached outputs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached output
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl<I, O, R> Runnable<I, O> for RunnableCache<R, O>
where
    I: Serialize + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
    R: Runnable<I, O>,
{
    fn name(&self) -> String {
        format!("RunnableCache<{}>", self.inner.name())
    }

    async fn run(&self, input: I, options: CallOptions) -> Result<O> {
        let key = serde_json::to_string(&(&input, &options.kwargs))?;
        if let Some(hit) = self.entries.get(&key) {
            tracing::trace!("cache hit for {}", self.inner.name());
            return Ok(hit.value().clone());
        }

        let output = self.inner.invoke(input, options).await?;
        if self.max_entries.map_or(true, |max| self.entries.len() < max) {
            self.entries.insert(key, output.clone());
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runnel_core::runnable::RunnableExt;
    use runnel_core::RunnableLambda;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(calls: &Arc<AtomicUsize>) -> RunnableLambda<String, usize> {
        let calls = calls.clone();
        RunnableLambda::from_fn("len", move |s: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(s.len())
        })
    }

    #[tokio::test]
    async fn test_repeated_input_hits_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cached = counting(&calls).layer(CacheLayer::new());

        for _ in 0..3 {
            let output = cached.invoke("hello".to_string(), CallOptions::new()).await.unwrap();
            assert_eq!(output, 5);
        }
        cached.invoke("hi".to_string(), CallOptions::new()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.len(), 2);
    }

    #[tokio::test]
    async fn test_kwargs_are_part_of_key() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cached = counting(&calls).layer(CacheLayer::new());

        let plain = CallOptions::new();
        let stopped = CallOptions::new().with_kwarg("stop", "x");
        cached.invoke("a".to_string(), plain).await.unwrap();
        cached.invoke("a".to_string(), stopped).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_max_entries_bounds_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cached = counting(&calls).layer(CacheLayer::new().with_max_entries(1));

        cached.invoke("a".to_string(), CallOptions::new()).await.unwrap();
        cached.invoke("b".to_string(), CallOptions::new()).await.unwrap();
        cached.invoke("b".to_string(), CallOptions::new()).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        cached.clear();
        assert!(cached.is_empty());
    }
}
