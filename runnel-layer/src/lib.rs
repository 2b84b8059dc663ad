//! # Runnel Layers
//!
//! Built-in layers for Runnel runnables.
//!
//! Currently implemented layers:
//! - `LoggingLayer`: Logs invoke, batch and stream calls with timing information
//! - `RetryLayer`: Automatic retry with exponential backoff for retryable errors
//! - `FallbackLayer`: Ordered alternates tried when the wrapped runnable fails
//! - `CacheLayer`: In-memory cache of successful outputs
//!
//! ## Usage
//!
//! ```ignore
//! use runnel_core::RunnableExt;
//! use runnel_layer::{FallbackLayer, LoggingLayer, RetryLayer};
//!
//! let model = remote
//!     .layer(RetryLayer::new().with_max_attempts(3))
//!     .layer(FallbackLayer::new(vec![backup.boxed()]))
//!     .layer(LoggingLayer::new());
//! ```

pub mod cache;
pub mod fallback;
pub mod logging;
pub mod retry;

// Re-exports
pub use cache::{CacheLayer, RunnableCache};
pub use fallback::{FallbackLayer, RunnableWithFallbacks};
pub use logging::{LoggingLayer, RunnableLogging};
pub use retry::{RetryLayer, RunnableRetry};
