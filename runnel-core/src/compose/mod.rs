//! Structural combinators: build larger runnables out of smaller ones.
//!
//! Fan-out combinators (sequence, map, branch) hand their children only the
//! cross-cutting config, tagged with the child's position. Transparent
//! wrappers (binding, each, router) forward the caller's kwargs as well.

pub mod binding;
pub mod branch;
pub mod each;
pub mod lambda;
pub mod map;
pub mod passthrough;
pub mod router;
pub mod sequence;

pub use binding::RunnableBinding;
pub use branch::RunnableBranch;
pub use each::RunnableEach;
pub use lambda::RunnableLambda;
pub use map::RunnableMap;
pub use passthrough::RunnablePassthrough;
pub use router::{RouterInput, RouterRunnable};
pub use sequence::RunnableSequence;

use crate::config::CallOptions;

/// Options for a fan-out child: the parent's config plus `tag`, no kwargs
pub(crate) fn step_options(options: &CallOptions, tag: impl Into<String>) -> CallOptions {
    options.config.child_with_tag(tag).into()
}
