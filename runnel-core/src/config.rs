//! Cross-cutting call configuration.
//!
//! [`RunnableConfig`] carries tags, metadata, observers, concurrency limits and
//! cancellation through every invocation. [`CallOptions`] pairs it with the
//! domain keyword arguments a particular stage interprets, so every combinator
//! can forward the config untouched while handing kwargs to its inner stage.

use crate::callback::Callback;
use crate::error::RunnableError;
use crate::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Cross-cutting parameters for a single call.
///
/// A config is never mutated once handed to a stage. Combinators derive child
/// configs with [`RunnableConfig::child_with_tag`] or
/// [`RunnableConfig::merged_over`] instead.
#[derive(Debug, Clone, Default)]
pub struct RunnableConfig {
    /// Ordered tags, inherited by child runs
    pub tags: Vec<String>,
    /// Free-form metadata, inherited by child runs
    pub metadata: HashMap<String, Value>,
    /// Observers notified around every run
    pub callbacks: Vec<Arc<dyn Callback>>,
    /// Cap on in-flight leaf invocations within one batch/each call
    pub max_concurrency: Option<usize>,
    /// Display name for the next run only; not inherited
    pub run_name: Option<String>,
    /// Cooperative cancellation handle
    pub signal: Option<CancellationToken>,
    /// Converted into a signal that fires after this duration
    pub timeout: Option<Duration>,
    pub(crate) parent_run_id: Option<Uuid>,
}

impl RunnableConfig {
    /// Create an empty config
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        push_unique(&mut self.tags, tag.into());
        self
    }

    /// Append several tags
    pub fn with_tags<T: Into<String>>(mut self, tags: impl IntoIterator<Item = T>) -> Self {
        for tag in tags {
            push_unique(&mut self.tags, tag.into());
        }
        self
    }

    /// Set a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Register an observer
    pub fn with_callback(mut self, callback: Arc<dyn Callback>) -> Self {
        self.callbacks.push(callback);
        self
    }

    /// Set the concurrency limit
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency);
        self
    }

    /// Set the run name
    pub fn with_run_name(mut self, run_name: impl Into<String>) -> Self {
        self.run_name = Some(run_name.into());
        self
    }

    /// Attach a cancellation handle
    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Set a timeout for the call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Id of the run this config was derived for, if any
    pub fn parent_run_id(&self) -> Option<Uuid> {
        self.parent_run_id
    }

    /// Whether the attached signal has fired
    pub fn is_cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(|s| s.is_cancelled())
    }

    /// Fail with [`RunnableError::Cancelled`] if the signal has fired
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RunnableError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Derive a config for a child step, appending `tag`.
    pub fn child_with_tag(&self, tag: impl Into<String>) -> Self {
        let mut child = self.clone();
        child.run_name = None;
        push_unique(&mut child.tags, tag.into());
        child
    }

    /// Derive the config handed to the body of run `run_id`.
    pub(crate) fn for_run(&self, run_id: Uuid) -> Self {
        let mut child = self.clone();
        child.run_name = None;
        child.parent_run_id = Some(run_id);
        child
    }

    /// Merge this config over `defaults`: values set here win, tags,
    /// metadata and callbacks are unioned with `defaults` first.
    pub fn merged_over(&self, defaults: &RunnableConfig) -> Self {
        let mut tags = defaults.tags.clone();
        for tag in &self.tags {
            push_unique(&mut tags, tag.clone());
        }

        let mut metadata = defaults.metadata.clone();
        metadata.extend(self.metadata.clone());

        let mut callbacks = defaults.callbacks.clone();
        callbacks.extend(self.callbacks.iter().cloned());

        Self {
            tags,
            metadata,
            callbacks,
            max_concurrency: self.max_concurrency.or(defaults.max_concurrency),
            run_name: self.run_name.clone().or_else(|| defaults.run_name.clone()),
            signal: self.signal.clone().or_else(|| defaults.signal.clone()),
            timeout: self.timeout.or(defaults.timeout),
            parent_run_id: self.parent_run_id.or(defaults.parent_run_id),
        }
    }
}

fn push_unique(tags: &mut Vec<String>, tag: String) {
    if !tags.contains(&tag) {
        tags.push(tag);
    }
}

/// Config plus the domain keyword arguments for one call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub config: RunnableConfig,
    pub kwargs: Map<String, Value>,
}

impl CallOptions {
    /// Create empty call options
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the config
    pub fn with_config(mut self, config: RunnableConfig) -> Self {
        self.config = config;
        self
    }

    /// Set a domain keyword argument
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Look up a domain keyword argument
    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }

    /// Separate the cross-cutting config from the domain kwargs
    pub fn split(self) -> (RunnableConfig, Map<String, Value>) {
        (self.config, self.kwargs)
    }

    /// Same options with the config replaced by a tagged child config
    pub fn child_with_tag(&self, tag: impl Into<String>) -> Self {
        Self {
            config: self.config.child_with_tag(tag),
            kwargs: self.kwargs.clone(),
        }
    }

    /// Layer caller options over bound options.
    ///
    /// The caller's config wins over the bound config, while bound kwargs are
    /// fixed and override whatever the caller passed.
    pub fn merged_over(&self, bound: &CallOptions) -> Self {
        let mut kwargs = self.kwargs.clone();
        for (key, value) in &bound.kwargs {
            kwargs.insert(key.clone(), value.clone());
        }
        Self {
            config: self.config.merged_over(&bound.config),
            kwargs,
        }
    }
}

impl From<RunnableConfig> for CallOptions {
    fn from(config: RunnableConfig) -> Self {
        Self {
            config,
            kwargs: Map::new(),
        }
    }
}

/// Options governing a batch call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Return per-item results instead of failing on the first error
    pub return_exceptions: bool,
    /// Overrides the config's `max_concurrency` for this batch
    pub max_concurrency: Option<usize>,
}

impl BatchOptions {
    /// Create default batch options
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture per-item errors
    pub fn with_return_exceptions(mut self, return_exceptions: bool) -> Self {
        self.return_exceptions = return_exceptions;
        self
    }

    /// Set the concurrency limit
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency);
        self
    }
}

/// Call options for a batch: one set shared by every item, or one per item.
#[derive(Debug, Clone)]
pub enum BatchCallOptions {
    Shared(CallOptions),
    PerItem(Vec<CallOptions>),
}

impl BatchCallOptions {
    /// Expand into exactly `len` per-item options
    pub fn resolve(self, len: usize) -> Result<Vec<CallOptions>> {
        match self {
            BatchCallOptions::Shared(options) => Ok(vec![options; len]),
            BatchCallOptions::PerItem(options) if options.len() == len => Ok(options),
            BatchCallOptions::PerItem(options) => Err(RunnableError::validation(format!(
                "batch received {} inputs but {} option sets",
                len,
                options.len()
            ))),
        }
    }

    /// Concurrency limit carried by the shared (or first) config
    pub fn max_concurrency(&self) -> Option<usize> {
        match self {
            BatchCallOptions::Shared(options) => options.config.max_concurrency,
            BatchCallOptions::PerItem(options) => {
                options.first().and_then(|o| o.config.max_concurrency)
            }
        }
    }

    /// Signal carried by the shared (or first) config
    pub(crate) fn signal(&self) -> Option<CancellationToken> {
        match self {
            BatchCallOptions::Shared(options) => options.config.signal.clone(),
            BatchCallOptions::PerItem(options) => {
                options.first().and_then(|o| o.config.signal.clone())
            }
        }
    }
}

impl Default for BatchCallOptions {
    fn default() -> Self {
        Self::Shared(CallOptions::default())
    }
}

impl From<CallOptions> for BatchCallOptions {
    fn from(options: CallOptions) -> Self {
        Self::Shared(options)
    }
}

impl From<RunnableConfig> for BatchCallOptions {
    fn from(config: RunnableConfig) -> Self {
        Self::Shared(config.into())
    }
}

impl From<Vec<CallOptions>> for BatchCallOptions {
    fn from(options: Vec<CallOptions>) -> Self {
        Self::PerItem(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_child_config_leaves_parent_untouched() {
        let parent = RunnableConfig::new()
            .with_tag("outer")
            .with_run_name("pipeline");
        let child = parent.child_with_tag("seq:step:1");

        assert_eq!(parent.tags, vec!["outer"]);
        assert_eq!(child.tags, vec!["outer", "seq:step:1"]);
        assert_eq!(parent.run_name.as_deref(), Some("pipeline"));
        assert!(child.run_name.is_none());
    }

    #[test]
    fn test_merge_caller_wins() {
        let bound = RunnableConfig::new()
            .with_tag("bound")
            .with_metadata("model", "small")
            .with_metadata("team", "search")
            .with_max_concurrency(2);
        let caller = RunnableConfig::new()
            .with_tag("caller")
            .with_metadata("model", "large");

        let merged = caller.merged_over(&bound);
        assert_eq!(merged.tags, vec!["bound", "caller"]);
        assert_eq!(merged.metadata["model"], json!("large"));
        assert_eq!(merged.metadata["team"], json!("search"));
        assert_eq!(merged.max_concurrency, Some(2));
    }

    #[test]
    fn test_bound_kwargs_are_fixed() {
        let bound = CallOptions::new().with_kwarg("stop", json!(["\n"]));
        let caller = CallOptions::new()
            .with_kwarg("stop", json!(["END"]))
            .with_kwarg("temperature", 0.5);

        let merged = caller.merged_over(&bound);
        assert_eq!(merged.kwarg("stop"), Some(&json!(["\n"])));
        assert_eq!(merged.kwarg("temperature"), Some(&json!(0.5)));
    }

    #[test]
    fn test_resolve_per_item_length_mismatch() {
        let options = BatchCallOptions::from(vec![CallOptions::new()]);
        let err = options.resolve(2).unwrap_err();
        assert!(matches!(err, RunnableError::Validation(_)));

        let shared = BatchCallOptions::from(RunnableConfig::new().with_tag("t"));
        let resolved = shared.resolve(3).unwrap();
        assert_eq!(resolved.len(), 3);
        assert!(resolved.iter().all(|o| o.config.tags == vec!["t"]));
    }

    #[test]
    fn test_cancellation_check() {
        let token = CancellationToken::new();
        let config = RunnableConfig::new().with_signal(token.clone());
        assert!(config.check_cancelled().is_ok());
        token.cancel();
        assert!(matches!(
            config.check_cancelled(),
            Err(RunnableError::Cancelled)
        ));
    }
}
