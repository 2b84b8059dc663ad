//! Runtime support shared by every runnable.
//!
//! - [`BatchExecutor`]: bounded fan-out with results slotted by input position
//! - [`guarded`] and [`cancellable`]: cooperative cancellation at suspension points
//! - [`TimeoutScope`]: turns a config timeout into a cancellation signal

pub mod cancel;
pub mod executor;

pub use cancel::{cancellable, guarded, Cancellable, TimeoutScope};
pub use executor::BatchExecutor;
