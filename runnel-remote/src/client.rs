//! Remote runnable client.
//!
//! Forwards invoke, batch and stream calls to a server hosting the real
//! runnable and revives the JSON it sends back into [`Value`]s.

use crate::sse::decode_events;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, Url};
use runnel_core::config::{BatchCallOptions, BatchOptions, CallOptions};
use runnel_core::error::RunnableError;
use runnel_core::protocol::{
    BatchRequest, BatchResponse, ErrorResponse, InvokeRequest, InvokeResponse, WireConfig,
};
use runnel_core::revive::{deserialize, revive};
use runnel_core::runnable::{RunScope, RunStream, Runnable};
use runnel_core::types::Value;
use runnel_core::Result;
use serde::Serialize;
use std::time::Duration;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Runnable hosted by another process and reached over HTTP.
///
/// Observers stay local: only tags, metadata and concurrency travel with a
/// request. Errors are never retried here; wrap the client in a retry
/// layer for that.
#[derive(Clone)]
pub struct RemoteRunnable {
    client: Client,
    url: String,
    timeout: Duration,
}

impl std::fmt::Debug for RemoteRunnable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRunnable")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RemoteRunnable {
    /// Create a client for the runnable served at `url` with default settings
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::builder().url(url).build()
    }

    /// Create a builder for more configuration options
    pub fn builder() -> RemoteRunnableBuilder {
        RemoteRunnableBuilder::default()
    }

    /// Base address, without a trailing slash
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response> {
        let endpoint = format!("{}{}", self.url, path);
        tracing::debug!("POST {}", endpoint);

        self.client
            .post(&endpoint)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(transport_error)
    }

    /// Fail with the server's `message` on a non-success status
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or(body);
        Err(RunnableError::http(status.as_u16(), message))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
        let body = response.text().await.map_err(transport_error)?;
        serde_json::from_str(&body).map_err(|e| {
            RunnableError::transport(format!("Invalid response from remote runnable: {}", e))
        })
    }

    async fn send_batch<I: Serialize + Send + Sync>(
        &self,
        inputs: &[I],
        options: &[CallOptions],
        batch_options: &BatchOptions,
    ) -> Result<Vec<Value>> {
        let request = BatchRequest {
            inputs: inputs.iter().collect::<Vec<_>>(),
            config: options
                .iter()
                .map(|o| WireConfig::from(&o.config).with_batch_options(batch_options))
                .collect(),
            kwargs: options.iter().map(|o| o.kwargs.clone()).collect(),
        };

        let response = Self::check_status(self.post("/batch", &request).await?).await?;
        let body: BatchResponse = Self::read_json(response).await?;
        let outputs = body
            .output
            .ok_or_else(|| RunnableError::transport("Invalid response from remote runnable"))?;
        if outputs.len() != inputs.len() {
            return Err(RunnableError::transport(format!(
                "Remote batch returned {} outputs for {} inputs",
                outputs.len(),
                inputs.len()
            )));
        }

        outputs.into_iter().map(revive).collect()
    }
}

fn transport_error(e: reqwest::Error) -> RunnableError {
    if e.is_timeout() {
        RunnableError::timeout(format!("remote call timed out: {}", e))
    } else {
        RunnableError::Network(e)
    }
}

#[async_trait]
impl<I> Runnable<I, Value> for RemoteRunnable
where
    I: Serialize + Send + Sync + 'static,
{
    fn name(&self) -> String {
        "RemoteRunnable".to_string()
    }

    async fn run(&self, input: I, options: CallOptions) -> Result<Value> {
        let (config, kwargs) = options.split();
        let request = InvokeRequest {
            input: &input,
            config: WireConfig::from(&config),
            kwargs,
        };

        let response = Self::check_status(self.post("/invoke", &request).await?).await?;
        let body: InvokeResponse = Self::read_json(response).await?;
        revive(body.output)
    }

    /// Sends every input in one request.
    ///
    /// Per-item error capture has no wire representation, so
    /// `return_exceptions` is rejected before anything is sent.
    async fn batch(
        &self,
        inputs: Vec<I>,
        options: BatchCallOptions,
        batch_options: BatchOptions,
    ) -> Result<Vec<Result<Value>>> {
        if batch_options.return_exceptions {
            return Err(RunnableError::validation(
                "return_exceptions is not supported for remote clients",
            ));
        }
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let name = Runnable::<I, Value>::name(self);
        let mut scopes = Vec::with_capacity(inputs.len());
        let mut scoped = Vec::with_capacity(inputs.len());
        for item_options in options.resolve(inputs.len())? {
            let (scope, item_options) = RunScope::start(name.clone(), item_options).await;
            scopes.push(scope);
            scoped.push(item_options);
        }

        let signal = scoped.first().and_then(|o| o.config.signal.clone());
        let sent = runnel_core::runtime::guarded(
            signal.as_ref(),
            self.send_batch(&inputs, &scoped, &batch_options),
        )
        .await;

        match sent {
            Ok(outputs) => {
                let mut results = Vec::with_capacity(outputs.len());
                for (scope, output) in scopes.into_iter().zip(outputs) {
                    results.push(scope.finish(Ok(output)).await);
                }
                Ok(results)
            }
            Err(e) => {
                for scope in scopes {
                    let _: Result<()> = scope.finish(Err(RunnableError::transport(e.to_string()))).await;
                }
                Err(e)
            }
        }
    }

    fn streams_natively(&self) -> bool {
        true
    }

    async fn run_stream(&self, input: I, options: CallOptions) -> Result<RunStream<Value>> {
        let (config, kwargs) = options.split();
        let request = InvokeRequest {
            input: &input,
            config: WireConfig::from(&config),
            kwargs,
        };

        let response = Self::check_status(self.post("/stream", &request).await?).await?;
        let events = decode_events(response.bytes_stream().map(|r| r.map_err(transport_error)));

        let chunks = async_stream::stream! {
            let mut events = std::pin::pin!(events);
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                match event.event.as_deref() {
                    Some("end") => return,
                    Some("error") => {
                        let message = serde_json::from_str::<ErrorResponse>(&event.data)
                            .ok()
                            .and_then(|e| e.message)
                            .unwrap_or(event.data);
                        yield Err(RunnableError::stream(message));
                        return;
                    }
                    _ if event.data.is_empty() => continue,
                    _ => yield deserialize(&event.data),
                }
            }
        };
        Ok(Box::pin(chunks))
    }
}

/// Builder for [`RemoteRunnable`]
#[derive(Debug, Default)]
pub struct RemoteRunnableBuilder {
    url: Option<String>,
    timeout: Option<Duration>,
    headers: Vec<(String, String)>,
    client: Option<Client>,
}

impl RemoteRunnableBuilder {
    /// Set the base address of the served runnable
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the per-request timeout (defaults to five seconds)
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send a header with every request
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Use an existing HTTP client; headers set on this builder are ignored
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<RemoteRunnable> {
        let url = self
            .url
            .ok_or_else(|| RunnableError::configuration("Remote runnable URL is required"))?;
        let url = url.strip_suffix('/').unwrap_or(&url).to_string();
        Url::parse(&url)
            .map_err(|e| RunnableError::configuration(format!("Invalid URL {}: {}", url, e)))?;

        let client = match self.client {
            Some(client) => client,
            None => {
                let mut headers = HeaderMap::new();
                for (name, value) in &self.headers {
                    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                        RunnableError::configuration(format!("Invalid header name {}: {}", name, e))
                    })?;
                    let value = HeaderValue::from_str(value).map_err(|e| {
                        RunnableError::configuration(format!("Invalid header value: {}", e))
                    })?;
                    headers.insert(name, value);
                }
                Client::builder()
                    .default_headers(headers)
                    .build()
                    .map_err(|e| RunnableError::configuration(format!("Failed to build HTTP client: {}", e)))?
            }
        };

        Ok(RemoteRunnable {
            client,
            url,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_normalized() {
        let remote = RemoteRunnable::new("http://localhost:8000/chain/").unwrap();
        assert_eq!(remote.url(), "http://localhost:8000/chain");
        assert_eq!(remote.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_builder_validates_url() {
        assert!(matches!(
            RemoteRunnable::builder().build(),
            Err(RunnableError::Configuration(_))
        ));
        assert!(matches!(
            RemoteRunnable::new("not a url"),
            Err(RunnableError::Configuration(_))
        ));
    }

    #[test]
    fn test_builder_settings() {
        let remote = RemoteRunnable::builder()
            .url("http://localhost:8000")
            .timeout(Duration::from_secs(30))
            .header("x-api-key", "secret")
            .build()
            .unwrap();
        assert_eq!(remote.timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_return_exceptions_rejected_before_sending() {
        // nothing listens on this port; the error must come before any request
        let remote = RemoteRunnable::new("http://127.0.0.1:9").unwrap();
        let err = remote
            .batch(
                vec!["a".to_string()],
                CallOptions::new().into(),
                BatchOptions::new().with_return_exceptions(true),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RunnableError::Validation(_)));
    }
}
