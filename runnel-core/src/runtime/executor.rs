//! Bounded fan-out for batch calls.

use crate::config::{BatchCallOptions, BatchOptions, CallOptions};
use crate::error::RunnableError;
use crate::Result;
use futures::StreamExt;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Runs one operation per input with at most `max_concurrency` in flight.
///
/// Results land in slots indexed by input position, so output order always
/// matches input order whatever the completion order. Without
/// `return_exceptions` the first failure is returned and the remaining
/// in-flight items are dropped; items already finished are not rolled back.
#[derive(Debug, Clone, Default)]
pub struct BatchExecutor {
    max_concurrency: Option<usize>,
    return_exceptions: bool,
    signal: Option<CancellationToken>,
}

impl BatchExecutor {
    /// Create an unbounded executor that fails on the first error
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an executor from batch call options.
    ///
    /// `BatchOptions::max_concurrency` takes precedence over the config's.
    pub fn from_options(options: &BatchCallOptions, batch_options: &BatchOptions) -> Self {
        Self {
            max_concurrency: batch_options
                .max_concurrency
                .or_else(|| options.max_concurrency()),
            return_exceptions: batch_options.return_exceptions,
            signal: options.signal(),
        }
    }

    /// Set the concurrency limit
    pub fn with_max_concurrency(mut self, max_concurrency: Option<usize>) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Capture per-item errors
    pub fn with_return_exceptions(mut self, return_exceptions: bool) -> Self {
        self.return_exceptions = return_exceptions;
        self
    }

    /// Stop starting new items once `signal` fires
    pub fn with_signal(mut self, signal: Option<CancellationToken>) -> Self {
        self.signal = signal;
        self
    }

    /// Run `operation` for every `(input, options)` pair.
    pub async fn execute<I, O, F, Fut>(
        &self,
        inputs: Vec<I>,
        options: Vec<CallOptions>,
        operation: F,
    ) -> Result<Vec<Result<O>>>
    where
        F: Fn(I, CallOptions) -> Fut,
        Fut: Future<Output = Result<O>>,
    {
        if inputs.len() != options.len() {
            return Err(RunnableError::validation(format!(
                "batch received {} inputs but {} option sets",
                inputs.len(),
                options.len()
            )));
        }

        let limit = match self.max_concurrency {
            Some(0) => {
                return Err(RunnableError::validation(
                    "max_concurrency must be a positive integer",
                ))
            }
            Some(n) => n,
            None => inputs.len().max(1),
        };

        let total = inputs.len();
        let operation = &operation;
        let signal = self.signal.as_ref();

        let mut pending = futures::stream::iter(inputs.into_iter().zip(options).enumerate())
            .map(|(index, (input, options))| async move {
                let result = match signal {
                    Some(s) if s.is_cancelled() => Err(RunnableError::Cancelled),
                    _ => operation(input, options).await,
                };
                (index, result)
            })
            .buffer_unordered(limit);

        let mut slots: Vec<Option<Result<O>>> = (0..total).map(|_| None).collect();
        while let Some((index, result)) = pending.next().await {
            match result {
                Err(e) if !self.return_exceptions => {
                    tracing::debug!("batch item {} failed, abandoning batch: {}", index, e);
                    return Err(e);
                }
                result => slots[index] = Some(result),
            }
        }

        Ok(slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(RunnableError::other("batch slot never filled"))))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn options(n: usize) -> Vec<CallOptions> {
        vec![CallOptions::new(); n]
    }

    #[tokio::test]
    async fn test_order_matches_input_despite_delays() {
        let inputs: Vec<u64> = vec![40, 5, 25, 1, 15];
        let results = BatchExecutor::new()
            .execute(inputs.clone(), options(inputs.len()), |delay, _| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(delay * 10)
            })
            .await
            .unwrap();

        let outputs: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(outputs, vec![400, 50, 250, 10, 150]);
    }

    #[tokio::test]
    async fn test_concurrency_bound() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = BatchExecutor::new()
            .with_max_concurrency(Some(2))
            .execute((0..8).collect::<Vec<_>>(), options(8), |i, _| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(i)
                }
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_return_exceptions_keeps_siblings() {
        let results = BatchExecutor::new()
            .with_return_exceptions(true)
            .execute(vec![1, 2, 3], options(3), |i, _| async move {
                if i == 2 {
                    Err(RunnableError::stage("two"))
                } else {
                    Ok(i)
                }
            })
            .await
            .unwrap();

        assert_eq!(*results[0].as_ref().unwrap(), 1);
        assert!(results[1].is_err());
        assert_eq!(*results[2].as_ref().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_first_failure_surfaces() {
        let err = BatchExecutor::new()
            .execute(vec![1, 2, 3], options(3), |i, _| async move {
                if i == 2 {
                    Err(RunnableError::stage("two"))
                } else {
                    Ok(i)
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RunnableError::Stage(m) if m == "two"));
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected() {
        let err = BatchExecutor::new()
            .with_max_concurrency(Some(0))
            .execute(vec![1], options(1), |i, _| async move { Ok(i) })
            .await
            .unwrap_err();
        assert!(matches!(err, RunnableError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cancelled_batch_starts_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let started = AtomicUsize::new(0);

        let results = BatchExecutor::new()
            .with_return_exceptions(true)
            .with_signal(Some(token))
            .execute(vec![1, 2], options(2), |i, _| {
                started.fetch_add(1, Ordering::SeqCst);
                async move { Ok(i) }
            })
            .await
            .unwrap();

        assert_eq!(started.load(Ordering::SeqCst), 0);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(RunnableError::Cancelled))));
    }
}
