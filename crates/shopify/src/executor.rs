//! Request execution with transport rotation and rate-limit backoff.
//!
//! [`RequestExecutor::execute`] is the only place that talks HTTP. Every
//! attempt goes through the selector's current transport and ends in one of
//! four outcomes:
//!
//! - success (2xx with a JSON body)
//! - rate limited (429): back off `2^n * base` and retry the same transport
//! - rejected (4xx from the Admin API itself): fail immediately
//! - transport failure (network error, timeout, proxy error, 5xx, non-JSON
//!   body): rotate to the next transport, or give up once the list is exhausted

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pic_finder_core::{Credentials, RelayRequest, RelayResponse};
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::credentials::CredentialStore;
use crate::notice::{Notice, SharedNoticeSink};
use crate::transport::{Route, Transport, TransportSelector};
use crate::{ShopifyError, TransportFailureReport, truncate};

/// User agent sent on every upstream call.
pub const USER_AGENT: &str = "DualPicFinder/1.0";

/// HTTP method of an Admin API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    /// Upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }

    const fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One Admin API call.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    /// Endpoint below `/admin/api/{version}/`, including any query string.
    pub endpoint: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// JSON body (ignored for GET).
    pub body: Option<Value>,
    /// Credentials overriding the stored pair.
    pub credentials: Option<Credentials>,
}

impl ApiRequest {
    /// GET request.
    #[must_use]
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// POST request with a JSON body.
    #[must_use]
    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: HttpMethod::Post,
            body: Some(body),
            credentials: None,
        }
    }

    /// Use these credentials instead of the stored ones.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Successful response: parsed JSON body plus lower-cased headers.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub data: Value,
    pub headers: BTreeMap<String, String>,
}

impl ApiResponse {
    /// Header value by (case-insensitive) name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Retry behaviour for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Transport attempts before giving up (rate-limit retries not counted).
    pub max_attempts: usize,
    /// Backoff retries allowed on 429 before failing with `RateLimited`.
    pub max_rate_limit_retries: u32,
    /// Base delay; retry `n` waits `2^n * backoff_base`.
    pub backoff_base: Duration,
    /// Timeout for a single attempt.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            max_rate_limit_retries: 5,
            backoff_base: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Same policy, restricted to one request on the wire.
    ///
    /// Used for non-idempotent calls, which must never be re-sent: no
    /// rotation and no rate-limit retries, so a 429 surfaces as `RateLimited`.
    #[must_use]
    pub const fn single_shot(self) -> Self {
        Self {
            max_attempts: 1,
            max_rate_limit_retries: 0,
            ..self
        }
    }

    /// Delay before rate-limit retry `retry` (0-based).
    #[must_use]
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        self.backoff_base.saturating_mul(2_u32.saturating_pow(retry))
    }
}

/// Result of a single attempt.
enum Attempt {
    Success(ApiResponse),
    RateLimited,
    Rejected { status: u16, message: String },
    Failed(String),
}

/// Executes Admin API calls over the configured transports.
pub struct RequestExecutor {
    http: reqwest::Client,
    credentials: CredentialStore,
    transports: TransportSelector,
    notices: SharedNoticeSink,
    rate_limit_noticed: AtomicBool,
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("transports", &self.transports)
            .finish_non_exhaustive()
    }
}

impl RequestExecutor {
    /// Create an executor.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        credentials: CredentialStore,
        transports: TransportSelector,
        notices: SharedNoticeSink,
    ) -> Result<Self, ShopifyError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            credentials,
            transports,
            notices,
            rate_limit_noticed: AtomicBool::new(false),
        })
    }

    /// The transport selector.
    #[must_use]
    pub const fn transports(&self) -> &TransportSelector {
        &self.transports
    }

    /// The credential store.
    #[must_use]
    pub const fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Execute a call.
    ///
    /// # Errors
    ///
    /// - `CredentialsMissing` if no credentials are stored or supplied
    /// - `RateLimited` once the rate-limit retries are used up
    /// - `UpstreamRejected` if the Admin API answers with a 4xx
    /// - `TransportFailure` if a single-shot call fails to get through
    /// - `AllTransportsExhausted` once every transport has failed
    #[instrument(skip(self, request, policy), fields(endpoint = %request.endpoint, method = %request.method))]
    pub async fn execute(
        &self,
        request: &ApiRequest,
        policy: &RetryPolicy,
    ) -> Result<ApiResponse, ShopifyError> {
        let credentials = match &request.credentials {
            Some(credentials) if credentials.is_complete() => credentials.clone(),
            Some(_) => return Err(ShopifyError::CredentialsMissing),
            None => self.credentials.require()?,
        };

        let max_attempts = policy.max_attempts.max(1);
        let mut failures: Vec<TransportFailureReport> = Vec::new();
        let mut rate_limit_retries = 0_u32;

        loop {
            let transport = self.transports.current().clone();
            debug!(
                attempt = failures.len() + 1,
                max_attempts,
                transport = %transport,
                "Executing Shopify request"
            );

            match self
                .attempt(&transport, request, &credentials, policy.request_timeout)
                .await
            {
                Attempt::Success(response) => {
                    debug!(transport = %transport, "Shopify request succeeded");
                    return Ok(response);
                }
                Attempt::RateLimited => {
                    if rate_limit_retries >= policy.max_rate_limit_retries {
                        warn!(retries = rate_limit_retries, "Rate limit retries exhausted");
                        return Err(ShopifyError::RateLimited {
                            retries: rate_limit_retries,
                        });
                    }
                    if !self.rate_limit_noticed.swap(true, Ordering::SeqCst) {
                        self.notices.notify(Notice::RateLimited);
                    }
                    let delay = policy.backoff_delay(rate_limit_retries);
                    rate_limit_retries += 1;
                    warn!(
                        retry = rate_limit_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Rate limited by Shopify, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Attempt::Rejected { status, message } => {
                    warn!(status, message = %message, "Shopify rejected the request");
                    return Err(ShopifyError::UpstreamRejected { status, message });
                }
                Attempt::Failed(message) => {
                    warn!(transport = %transport, error = %message, "Transport attempt failed");
                    if max_attempts == 1 {
                        return Err(ShopifyError::TransportFailure {
                            transport: transport.name().to_string(),
                            message,
                        });
                    }
                    failures.push(TransportFailureReport {
                        transport: transport.name().to_string(),
                        message: message.clone(),
                    });
                    if !self.transports.advance() || failures.len() >= max_attempts {
                        return Err(ShopifyError::AllTransportsExhausted {
                            failures,
                            last_error: message,
                        });
                    }
                }
            }
        }
    }

    async fn attempt(
        &self,
        transport: &Transport,
        request: &ApiRequest,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Attempt {
        let route = self
            .transports
            .route_for(transport, &request.endpoint, &credentials.shop_domain);
        let outcome = match route {
            Route::Url(url) => {
                tokio::time::timeout(timeout, self.send_direct(&url, transport, request, credentials))
                    .await
            }
            Route::Relay(endpoint) => {
                tokio::time::timeout(timeout, self.send_relay(&endpoint, request, credentials)).await
            }
        };
        outcome.unwrap_or_else(|_| {
            Attempt::Failed(format!("timed out after {} ms", timeout.as_millis()))
        })
    }

    async fn send_direct(
        &self,
        url: &str,
        transport: &Transport,
        request: &ApiRequest,
        credentials: &Credentials,
    ) -> Attempt {
        let mut builder = self
            .http
            .request(request.method.to_reqwest(), url)
            .header("X-Shopify-Access-Token", credentials.access_token.expose_secret())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        if request.method != HttpMethod::Get
            && let Some(body) = &request.body
        {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Failed(e.to_string()),
        };

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return Attempt::Failed(format!("failed to read body: {e}")),
        };

        classify(status, headers, &text, transport.is_authoritative())
    }

    async fn send_relay(
        &self,
        endpoint: &str,
        request: &ApiRequest,
        credentials: &Credentials,
    ) -> Attempt {
        let envelope = RelayRequest {
            shop_domain: credentials.clean_domain().to_string(),
            access_token: credentials.access_token.expose_secret().to_string(),
            target_endpoint: request.endpoint.clone(),
            method: Some(request.method.as_str().to_string()),
            body: request.body.clone().filter(|_| request.method != HttpMethod::Get),
        };

        let response = match self.http.post(endpoint).json(&envelope).send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Failed(e.to_string()),
        };
        let relay_status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return Attempt::Failed(format!("failed to read relay body: {e}")),
        };

        match serde_json::from_str::<RelayResponse>(&text) {
            Ok(envelope) => {
                let headers = envelope
                    .headers
                    .into_iter()
                    .map(|(name, value)| (name.to_ascii_lowercase(), value))
                    .collect();
                match envelope.data {
                    Value::String(body) => classify(envelope.status, headers, &body, true),
                    data => {
                        let text = data.to_string();
                        classify_json(envelope.status, headers, data, &text, true)
                    }
                }
            }
            Err(_) => Attempt::Failed(format!(
                "relay error {relay_status}: {}",
                truncate(&text, 500)
            )),
        }
    }
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

/// Classify a raw response body.
fn classify(status: u16, headers: BTreeMap<String, String>, text: &str, authoritative: bool) -> Attempt {
    match serde_json::from_str::<Value>(text) {
        Ok(data) => classify_json(status, headers, data, text, authoritative),
        Err(_) if (200..300).contains(&status) => {
            warn!(status, body = %truncate(text, 500), "Success status with non-JSON body");
            Attempt::Failed(format!("non-JSON response: {}", truncate(text, 200)))
        }
        Err(_) => classify_error(status, text, authoritative),
    }
}

fn classify_json(
    status: u16,
    headers: BTreeMap<String, String>,
    data: Value,
    text: &str,
    authoritative: bool,
) -> Attempt {
    if (200..300).contains(&status) {
        return Attempt::Success(ApiResponse { data, headers });
    }
    if authoritative && (400..500).contains(&status) && status != 429 {
        return Attempt::Rejected {
            status,
            message: upstream_message(&data).unwrap_or_else(|| truncate(text, 200)),
        };
    }
    classify_error(status, text, authoritative)
}

fn classify_error(status: u16, text: &str, authoritative: bool) -> Attempt {
    if status == 429 {
        return Attempt::RateLimited;
    }
    if authoritative && (400..500).contains(&status) {
        return Attempt::Rejected {
            status,
            message: truncate(text, 200),
        };
    }
    debug!(status, body = %truncate(text, 500), "Error response body");
    Attempt::Failed(format!("HTTP {status}: {}", truncate(text, 200)))
}

/// Pull the human-readable message out of a Shopify error body.
fn upstream_message(data: &Value) -> Option<String> {
    let errors = data.get("errors").or_else(|| data.get("error"))?;
    Some(match errors {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}
