//! Concurrent fan-out over named steps.

use super::step_options;
use crate::config::CallOptions;
use crate::runnable::{BoxRunnable, Runnable};
use crate::Result;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;

/// Runs every named step on the same input concurrently and collects a
/// mapping of step name to output. Any failing step fails the whole map.
pub struct RunnableMap<I, O> {
    steps: Vec<(String, BoxRunnable<I, O>)>,
}

impl<I, O> RunnableMap<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    /// Create an empty map
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Add a step, replacing any step with the same name
    pub fn with_step(mut self, name: impl Into<String>, step: impl Runnable<I, O>) -> Self {
        self.insert(name.into(), Arc::new(step));
        self
    }

    /// Add an already type-erased step
    pub fn with_boxed_step(mut self, name: impl Into<String>, step: BoxRunnable<I, O>) -> Self {
        self.insert(name.into(), step);
        self
    }

    /// Step names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|(name, _)| name.as_str())
    }

    fn insert(&mut self, name: String, step: BoxRunnable<I, O>) {
        match self.steps.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = step,
            None => self.steps.push((name, step)),
        }
    }
}

impl<I, O> Default for RunnableMap<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<I, O> Runnable<I, HashMap<String, O>> for RunnableMap<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: I, options: CallOptions) -> Result<HashMap<String, O>> {
        let futures = self.steps.iter().map(|(name, step)| {
            let input = input.clone();
            let options = step_options(&options, format!("map:key:{}", name));
            async move {
                let output = step.invoke(input, options).await?;
                Ok::<_, crate::error::RunnableError>((name.clone(), output))
            }
        });

        let outputs = try_join_all(futures).await?;
        Ok(outputs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{RunnableLambda, RunnablePassthrough};
    use crate::error::RunnableError;
    use crate::runnable::RunnableExt;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_map_collects_named_outputs() {
        let map = RunnableMap::new()
            .with_step("original", RunnablePassthrough)
            .with_step("upper", RunnableLambda::from_fn("upper", |s: String| Ok(s.to_uppercase())))
            .with_step("reversed", RunnableLambda::from_fn("rev", |s: String| Ok(s.chars().rev().collect())));

        let output = map.invoke("abc".to_string(), CallOptions::new()).await.unwrap();
        assert_eq!(output.len(), 3);
        assert_eq!(output["original"], "abc");
        assert_eq!(output["upper"], "ABC");
        assert_eq!(output["reversed"], "cba");
    }

    #[tokio::test]
    async fn test_boxed_steps_and_replacement() {
        let upper = RunnableLambda::from_fn("upper", |s: String| Ok(s.to_uppercase())).boxed();
        let map = RunnableMap::new()
            .with_step("text", RunnablePassthrough)
            .with_boxed_step("shout", upper)
            .with_step("text", RunnableLambda::from_fn("trim", |s: String| Ok(s.trim().to_string())));

        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["text", "shout"]);

        let output = map.invoke(" hi ".to_string(), CallOptions::new()).await.unwrap();
        assert_eq!(output["text"], "hi");
        assert_eq!(output["shout"], " HI ");
    }

    #[tokio::test]
    async fn test_map_runs_concurrently() {
        let sleeper = |name: &str| {
            RunnableLambda::new(name.to_string(), |x: u64, _| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(x)
            })
        };
        let map = RunnableMap::new()
            .with_step("a", sleeper("a"))
            .with_step("b", sleeper("b"))
            .with_step("c", sleeper("c"));

        let started = Instant::now();
        map.invoke(1, CallOptions::new()).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(140));
    }

    #[tokio::test]
    async fn test_any_failure_fails_map() {
        let map = RunnableMap::new()
            .with_step("ok", RunnableLambda::from_fn("ok", |x: i32| Ok(x)))
            .with_step("bad", RunnableLambda::from_fn("bad", |_: i32| -> Result<i32> {
                Err(RunnableError::stage("bad step"))
            }));

        let err = map.invoke(1, CallOptions::new()).await.unwrap_err();
        assert!(matches!(err, RunnableError::Stage(_)));
    }

    #[tokio::test]
    async fn test_map_feeds_sequence() {
        let pipeline = RunnableMap::new()
            .with_step("n", RunnablePassthrough)
            .with_step("double", RunnableLambda::from_fn("double", |x: i64| Ok(x * 2)))
            .pipe(RunnableLambda::from_fn("sum", |m: HashMap<String, i64>| {
                Ok(m.values().sum::<i64>())
            }));

        assert_eq!(pipeline.invoke(5, CallOptions::new()).await.unwrap(), 15);
    }
}
