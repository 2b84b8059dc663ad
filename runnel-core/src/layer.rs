//! Layer trait and abstractions.
//!
//! Inspired by OpenDAL's architecture, layers provide a composable way to wrap
//! runnables with cross-cutting concerns like logging, retry, fallbacks and
//! caching without changing their input or output types.

use crate::runnable::Runnable;

/// Layer trait for wrapping runnables.
///
/// Each layer wraps an inner runnable and returns a new runnable with the
/// same calling convention and enhanced behavior.
///
/// ```ignore
/// let resilient = model
///     .layer(RetryLayer::new().with_max_attempts(3))
///     .layer(FallbackLayer::new(vec![backup.boxed()]));
/// ```
pub trait Layer<I, O, R>
where
    I: Send + 'static,
    O: Send + 'static,
    R: Runnable<I, O>,
{
    /// The type of the layered runnable
    type Layered: Runnable<I, O>;

    /// Wrap the inner runnable with this layer
    fn layer(&self, inner: R) -> Self::Layered;
}
