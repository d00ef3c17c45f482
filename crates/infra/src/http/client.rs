use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, StatusCode};
use storeguard_common::resilience::{with_timeout, DEFAULT_CALL_TIMEOUT};
use storeguard_core::{RetryOptions, RetryOutcome, RetryService};
use storeguard_domain::{HttpConfig, StoreGuardError};
use tracing::debug;

use crate::errors::InfraError;

/// Failure of one guarded HTTP call.
#[derive(Debug, thiserror::Error)]
pub enum HttpCallError {
    /// The deadline fired before a response arrived
    #[error("HTTP request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Transport failure (connect, TLS, body)
    #[error("HTTP request failed: {0}")]
    Network(#[source] reqwest::Error),

    /// A response the retry predicate rejected
    #[error("HTTP {status} from {url}")]
    RetryableStatus { status: StatusCode, url: String },

    /// The request could not be built or replayed
    #[error("invalid HTTP request: {0}")]
    InvalidRequest(String),
}

impl From<HttpCallError> for StoreGuardError {
    fn from(err: HttpCallError) -> Self {
        match err {
            HttpCallError::Timeout { timeout_ms } => {
                StoreGuardError::Timeout(format!("HTTP request timed out after {timeout_ms}ms"))
            }
            HttpCallError::Network(source) => InfraError::from(source).into(),
            HttpCallError::RetryableStatus { status, url } => {
                StoreGuardError::Network(format!("HTTP {} from {url}", status.as_u16()))
            }
            HttpCallError::InvalidRequest(message) => StoreGuardError::InvalidInput(message),
        }
    }
}

/// Default retry predicate: only 5xx responses are retried.
pub fn is_server_error(response: &Response) -> bool {
    response.status().is_server_error()
}

/// HTTP client whose calls are bounded by a deadline.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    timeout: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, StoreGuardError> {
        Self::builder().build()
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self, StoreGuardError> {
        Self::builder().timeout(Duration::from_millis(config.timeout_ms)).build()
    }

    /// Deadline applied by [`HttpClient::fetch_with_timeout`] when none is given
    pub fn default_timeout(&self) -> Duration {
        self.timeout
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Send `request`, giving up after `timeout` (or the client default).
    ///
    /// Any response is returned as-is; status codes are not inspected.
    pub async fn fetch_with_timeout(
        &self,
        request: RequestBuilder,
        timeout: Option<Duration>,
    ) -> Result<Response, HttpCallError> {
        let deadline = timeout.unwrap_or(self.timeout);
        let request = request.build().map_err(|err| HttpCallError::InvalidRequest(err.to_string()))?;

        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, timeout_ms = deadline.as_millis() as u64, "sending HTTP request");

        match with_timeout(deadline, self.client.execute(request)).await {
            Ok(Ok(response)) => {
                debug!(%method, %url, status = %response.status(), "received HTTP response");
                Ok(response)
            }
            Ok(Err(err)) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                Err(HttpCallError::Network(err))
            }
            Err(elapsed) => Err(HttpCallError::Timeout {
                timeout_ms: elapsed.timeout.as_millis() as u64,
            }),
        }
    }

    /// [`HttpClient::fetch_with_retry_on`] retrying 5xx responses only.
    pub async fn fetch_with_retry(
        &self,
        retry: &RetryService,
        queue_name: &str,
        request: RequestBuilder,
        options: &RetryOptions<HttpCallError>,
    ) -> RetryOutcome<Response, HttpCallError> {
        self.fetch_with_retry_on(retry, queue_name, request, options, is_server_error).await
    }

    /// Send `request` through the retry engine.
    ///
    /// Each attempt replays a clone of `request` under the client deadline. A
    /// response for which `retry_on` returns `true` becomes
    /// [`HttpCallError::RetryableStatus`], so it is retried and dead-lettered
    /// like any other failure. The body must be clonable (not a stream).
    pub async fn fetch_with_retry_on<R>(
        &self,
        retry: &RetryService,
        queue_name: &str,
        request: RequestBuilder,
        options: &RetryOptions<HttpCallError>,
        retry_on: R,
    ) -> RetryOutcome<Response, HttpCallError>
    where
        R: Fn(&Response) -> bool,
    {
        let retry_on = &retry_on;
        retry
            .execute(
                queue_name,
                || {
                    let attempt = request.try_clone();
                    async move {
                        let attempt = attempt.ok_or_else(|| {
                            HttpCallError::InvalidRequest(
                                "request body cannot be cloned; buffer the body to enable retries"
                                    .into(),
                            )
                        })?;

                        let response = self.fetch_with_timeout(attempt, None).await?;
                        if retry_on(&response) {
                            return Err(HttpCallError::RetryableStatus {
                                status: response.status(),
                                url: response.url().to_string(),
                            });
                        }
                        Ok(response)
                    }
                },
                options,
            )
            .await
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self { timeout: DEFAULT_CALL_TIMEOUT, user_agent: None, default_headers: None }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpClient, StoreGuardError> {
        if self.timeout.is_zero() {
            return Err(StoreGuardError::Config("HTTP timeout must be greater than 0".into()));
        }

        let mut builder = ReqwestClient::builder().no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| StoreGuardError::from(InfraError::from(err)))?;

        Ok(HttpClient { client, timeout: self.timeout })
    }
}
