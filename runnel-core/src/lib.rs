//! # Runnel Core
//!
//! Core abstractions and runtime for composable async pipelines.
//!
//! This crate provides the [`Runnable`] contract every pipeline stage
//! implements, the structural combinators that build larger stages out of
//! smaller ones, the call configuration carried through every invocation,
//! and the wire protocol used to run a stage in another process.

pub mod callback;
pub mod compose;
pub mod config;
pub mod error;
pub mod layer;
pub mod protocol;
pub mod revive;
pub mod runnable;
pub mod runtime;
pub mod types;

// Re-exports
pub use callback::{Callback, CallbackManager, RunInfo};
pub use compose::{
    RouterInput, RouterRunnable, RunnableBinding, RunnableBranch, RunnableEach, RunnableLambda,
    RunnableMap, RunnablePassthrough, RunnableSequence,
};
pub use config::{BatchCallOptions, BatchOptions, CallOptions, RunnableConfig};
pub use error::RunnableError;
pub use layer::Layer;
pub use revive::{deserialize, revive, to_structural_wire, to_wire};
pub use runnable::{
    cancellable_config, collect_stream, concat_stream, single_chunk, BoxRunnable, RunScope,
    RunStream, Runnable, RunnableExt,
};
pub use runtime::BatchExecutor;
pub use types::*;

pub use tokio_util::sync::CancellationToken;

/// Result type alias for runnable operations
pub type Result<T> = std::result::Result<T, RunnableError>;
