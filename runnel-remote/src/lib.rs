//! # Runnel Remote
//!
//! Client side of the remote runnable protocol.
//!
//! A [`RemoteRunnable`] behaves like any local runnable, but every call is
//! forwarded to a server hosting the real stage:
//!
//! ```ignore
//! use runnel_core::{CallOptions, Runnable};
//! use runnel_remote::RemoteRunnable;
//!
//! let chain = RemoteRunnable::new("http://localhost:8000/chain/")?;
//! let answer = chain.invoke("What is Rust?", CallOptions::new()).await?;
//! ```

pub mod client;
pub mod sse;

// Re-exports
pub use client::{RemoteRunnable, RemoteRunnableBuilder, DEFAULT_TIMEOUT};
pub use sse::{decode_events, SseDecoder, SseEvent};
