//! Wire envelopes for remote execution.
//!
//! ```text
//! POST {base}/invoke   {input, config, kwargs}        -> {output}
//! POST {base}/batch    {inputs, config[], kwargs[]}   -> {output: [...]}
//! POST {base}/stream   {input, config, kwargs}        -> event stream of `data: <json>`
//! ```
//!
//! Observers, cancellation handles and run names are process-local and never
//! serialized.

use crate::config::{BatchOptions, RunnableConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::collections::HashMap;

/// The serializable part of a [`RunnableConfig`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_exceptions: Option<bool>,
}

impl WireConfig {
    /// Fold shared batch options into a per-item config
    pub fn with_batch_options(mut self, options: &BatchOptions) -> Self {
        if options.max_concurrency.is_some() {
            self.max_concurrency = options.max_concurrency;
        }
        self.return_exceptions = Some(options.return_exceptions);
        self
    }
}

impl From<&RunnableConfig> for WireConfig {
    fn from(config: &RunnableConfig) -> Self {
        Self {
            tags: config.tags.clone(),
            metadata: config.metadata.clone(),
            max_concurrency: config.max_concurrency,
            return_exceptions: None,
        }
    }
}

/// Body of `/invoke` and `/stream`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest<I> {
    pub input: I,
    pub config: WireConfig,
    #[serde(default)]
    pub kwargs: Map<String, Json>,
}

/// Body of `/batch`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest<I> {
    pub inputs: Vec<I>,
    pub config: Vec<WireConfig>,
    #[serde(default)]
    pub kwargs: Vec<Map<String, Json>>,
}

/// Response of `/invoke`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub output: Json,
}

/// Response of `/batch`.
///
/// `output` is optional so that a missing field can be reported as a
/// transport error rather than a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub output: Option<Vec<Json>>,
}

/// Error body sent with a non-success status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Frame one JSON payload as an event-stream `data` event
pub fn encode_event(payload: &Json) -> String {
    let text = payload.to_string();
    let mut event = String::with_capacity(text.len() + 8);
    for line in text.lines() {
        event.push_str("data: ");
        event.push_str(line);
        event.push('\n');
    }
    event.push('\n');
    event
}
