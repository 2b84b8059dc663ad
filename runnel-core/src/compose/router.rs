//! Key-based dispatch to named runnables.

use crate::config::CallOptions;
use crate::error::RunnableError;
use crate::runnable::{BoxRunnable, RunStream, Runnable};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Input to a [`RouterRunnable`]: the routing key and the payload for the
/// selected route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterInput<I> {
    pub key: String,
    pub input: I,
}

impl<I> RouterInput<I> {
    pub fn new(key: impl Into<String>, input: I) -> Self {
        Self {
            key: key.into(),
            input,
        }
    }
}

/// Dispatches each input to the runnable registered under its key.
///
/// An unknown key fails with a validation error before anything runs.
pub struct RouterRunnable<I, O> {
    routes: HashMap<String, BoxRunnable<I, O>>,
}

impl<I, O> RouterRunnable<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register a route, replacing any existing one under `key`
    pub fn with_route(mut self, key: impl Into<String>, runnable: impl Runnable<I, O>) -> Self {
        self.routes.insert(key.into(), Arc::new(runnable));
        self
    }

    fn route(&self, key: &str) -> Result<&BoxRunnable<I, O>> {
        self.routes
            .get(key)
            .ok_or_else(|| RunnableError::validation(format!("No runnable associated with key \"{}\"", key)))
    }
}

impl<I, O> Default for RouterRunnable<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<I, O> Runnable<RouterInput<I>, O> for RouterRunnable<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: RouterInput<I>, options: CallOptions) -> Result<O> {
        let runnable = self.route(&input.key)?;
        runnable.invoke(input.input, options).await
    }

    fn streams_natively(&self) -> bool {
        true
    }

    async fn run_stream(&self, input: RouterInput<I>, options: CallOptions) -> Result<RunStream<O>> {
        let runnable = self.route(&input.key)?;
        runnable.stream(input.input, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::RunnableLambda;
    use crate::config::BatchOptions;

    fn router() -> RouterRunnable<i64, i64> {
        RouterRunnable::new()
            .with_route("double", RunnableLambda::from_fn("double", |x: i64| Ok(x * 2)))
            .with_route("negate", RunnableLambda::from_fn("negate", |x: i64| Ok(-x)))
    }

    #[tokio::test]
    async fn test_routes_by_key() {
        let router = router();
        let doubled = router
            .invoke(RouterInput::new("double", 4), CallOptions::new())
            .await
            .unwrap();
        let negated = router
            .invoke(RouterInput::new("negate", 4), CallOptions::new())
            .await
            .unwrap();
        assert_eq!((doubled, negated), (8, -4));
    }

    #[tokio::test]
    async fn test_unknown_key_is_validation_error() {
        let err = router()
            .invoke(RouterInput::new("square", 4), CallOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RunnableError::Validation(_)));
        assert!(err.to_string().contains("square"));
    }

    #[tokio::test]
    async fn test_batch_mixes_routes() {
        let inputs = vec![
            RouterInput::new("double", 1),
            RouterInput::new("negate", 2),
            RouterInput::new("double", 3),
        ];
        let outputs = router()
            .batch(inputs, CallOptions::new().into(), BatchOptions::new())
            .await
            .unwrap()
            .into_iter()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(outputs, vec![2, -2, 6]);
    }

    #[test]
    fn test_router_input_wire_shape() {
        let input: RouterInput<String> =
            serde_json::from_value(serde_json::json!({"key": "a", "input": "hello"})).unwrap();
        assert_eq!(input, RouterInput::new("a", "hello".to_string()));
    }
}
