//! Cooperative cancellation.
//!
//! A cancellation signal is advisory: every suspension point races the work
//! against the signal and aborts with [`RunnableError::Cancelled`] once it fires.

use crate::config::RunnableConfig;
use crate::error::RunnableError;
use crate::Result;
use futures::Stream;
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFutureOwned};

/// Run `fut` unless `signal` fires first.
pub async fn guarded<T, F>(signal: Option<&CancellationToken>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let Some(token) = signal else {
        return fut.await;
    };

    if token.is_cancelled() {
        return Err(RunnableError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(RunnableError::Cancelled),
        result = fut => result,
    }
}

/// Stream adapter that ends with [`RunnableError::Cancelled`] once the
/// signal fires.
#[pin_project]
pub struct Cancellable<S> {
    #[pin]
    inner: S,
    #[pin]
    cancelled: WaitForCancellationFutureOwned,
    done: bool,
}

impl<S> Cancellable<S> {
    pub fn new(inner: S, signal: CancellationToken) -> Self {
        Self {
            inner,
            cancelled: signal.cancelled_owned(),
            done: false,
        }
    }
}

impl<S, T> Stream for Cancellable<S>
where
    S: Stream<Item = Result<T>>,
{
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        if this.cancelled.poll(cx).is_ready() {
            *this.done = true;
            return Poll::Ready(Some(Err(RunnableError::Cancelled)));
        }

        match this.inner.poll_next(cx) {
            Poll::Ready(None) => {
                *this.done = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

/// Wrap `stream` so it observes `signal`, if there is one.
pub fn cancellable<T, S>(
    stream: S,
    signal: Option<CancellationToken>,
) -> Pin<Box<dyn Stream<Item = Result<T>> + Send>>
where
    T: Send + 'static,
    S: Stream<Item = Result<T>> + Send + 'static,
{
    match signal {
        Some(token) => Box::pin(Cancellable::new(stream, token)),
        None => Box::pin(stream),
    }
}

/// A cancellation signal derived from a config timeout.
///
/// The derived token is a child of the caller's signal, so cancelling the
/// caller still cancels the run. Dropping the scope tears the timer down.
#[derive(Debug)]
pub struct TimeoutScope {
    token: CancellationToken,
    parent: Option<CancellationToken>,
    timeout: Duration,
    _guard: DropGuard,
}

impl TimeoutScope {
    /// Consume `config.timeout`, replacing it with a signal that fires after
    /// that duration. Returns `None` when there is no timeout.
    pub fn arm(config: &mut RunnableConfig) -> Option<Self> {
        let timeout = config.timeout.take()?;
        let parent = config.signal.clone();
        let token = parent
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_default();

        let timer = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    tracing::debug!("run timed out after {:?}", timeout);
                    timer.cancel();
                }
                _ = timer.cancelled() => {}
            }
        });

        config.signal = Some(token.clone());
        Some(Self {
            _guard: token.clone().drop_guard(),
            token,
            parent,
            timeout,
        })
    }

    /// Report a cancellation caused by this scope's deadline as a timeout.
    pub fn classify(&self, error: RunnableError) -> RunnableError {
        let parent_cancelled = self.parent.as_ref().is_some_and(|p| p.is_cancelled());
        match error {
            RunnableError::Cancelled if self.token.is_cancelled() && !parent_cancelled => {
                RunnableError::timeout(format!("run exceeded {:?}", self.timeout))
            }
            other => other,
        }
    }
}
