//! Error types for runnable execution.

/// The main error type for runnable operations.
#[derive(Debug, thiserror::Error)]
pub enum RunnableError {
    /// Malformed input, routing key, revived shape or unsupported option.
    /// Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Failure raised by a leaf stage
    #[error("Stage error: {0}")]
    Stage(String),

    /// Every fallback failed; errors are kept in attempted order
    #[error("All {} attempts failed: {}", .0.len(), join_errors(.0))]
    Fallbacks(Vec<RunnableError>),

    /// The final error after exhausting retries
    #[error("Failed after {attempts} attempt(s): {source}")]
    Retry {
        attempts: u32,
        #[source]
        source: Box<RunnableError>,
    },

    /// Non-success response from a remote runnable
    #[error("Remote call failed with status code {status}: {message}")]
    Http { status: u16, message: String },

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed or missing payload from a remote runnable
    #[error("Transport error: {0}")]
    Transport(String),

    /// Timeout errors
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The call's cancellation signal fired
    #[error("Run cancelled")]
    Cancelled,

    /// Rate limit errors
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Stream errors
    #[error("Stream error: {0}")]
    Stream(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic errors
    #[error("Error: {0}")]
    Other(String),
}

fn join_errors(errors: &[RunnableError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, e)| format!("[{}] {}", i, e))
        .collect::<Vec<_>>()
        .join("; ")
}

impl RunnableError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a stage error
    pub fn stage(msg: impl Into<String>) -> Self {
        Self::Stage(msg.into())
    }

    /// Create an HTTP status error
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limit(msg: impl Into<String>) -> Self {
        Self::RateLimit(msg.into())
    }

    /// Create a stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        match self {
            RunnableError::Network(_) | RunnableError::Timeout(_) | RunnableError::RateLimit(_) => {
                true
            }
            RunnableError::Http { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            _ => false,
        }
    }

    /// The number of attempts recorded on a retry error, if any
    pub fn attempts(&self) -> Option<u32> {
        match self {
            RunnableError::Retry { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Unwrap retry tagging and return the underlying error
    pub fn root(&self) -> &RunnableError {
        match self {
            RunnableError::Retry { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<String> for RunnableError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for RunnableError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}
