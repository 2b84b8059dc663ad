//! # Runnel
//!
//! Composable async pipelines for Rust.
//!
//! Every stage implements one contract, [`Runnable`], with single-shot,
//! batched and streaming execution. Stages combine into larger stages
//! (sequences, maps, branches, routers), gain resilience through layers
//! (retry, fallbacks) and can run in another process through the remote
//! client.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! runnel = { version = "0.1", features = ["layers", "remote"] }
//! ```
//!
//! ```ignore
//! use runnel::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let model = RemoteRunnable::new("http://localhost:8000/chat/")?
//!     .layer(RetryLayer::new().with_max_attempts(3));
//!
//! let pipeline = RunnableLambda::from_fn("question", |topic: String| {
//!     Ok(format!("Explain {} in one sentence.", topic))
//! })
//! .pipe(model);
//!
//! let answer = pipeline.invoke("ownership".to_string(), CallOptions::new()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: Includes `remote`, `layers` and `plugins`
//! - `remote`: Remote runnable client
//! - `layers`: Built-in layers (logging, retry, fallbacks, caching)
//! - `plugins`: Built-in observers (tracing, run collection)
//! - `full`: All features enabled

// Re-export core types and traits
pub use runnel_core::*;

// Re-export the remote client under `remote` module
#[cfg(feature = "runnel-remote")]
pub mod remote {
    //! Remote runnable client.
    pub use runnel_remote::*;
}

// Re-export layers under `layers` module
#[cfg(feature = "runnel-layer")]
pub mod layers {
    //! Built-in layers.
    pub use runnel_layer::*;
}

// Re-export plugins under `plugin` module
#[cfg(feature = "runnel-plugin")]
pub mod plugin {
    //! Built-in observers.
    pub use runnel_plugin::*;
}

/// Prelude module for convenient imports
pub mod prelude {
    //! Prelude module containing the most commonly used types and traits.
    //!
    //! ```
    //! use runnel::prelude::*;
    //! ```

    pub use crate::{
        BatchOptions, BoxRunnable, CallOptions, Callback, Document, Layer, Message,
        MessageChunk, PromptValue, Result, Role, RouterInput, RouterRunnable, Runnable,
        RunnableBranch, RunnableConfig, RunnableError, RunnableExt, RunnableLambda, RunnableMap,
        RunnablePassthrough, Value,
    };

    #[cfg(feature = "runnel-remote")]
    pub use crate::remote::*;

    #[cfg(feature = "runnel-layer")]
    pub use crate::layers::*;

    #[cfg(feature = "runnel-plugin")]
    pub use crate::plugin::*;
}
