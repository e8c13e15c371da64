//! Blocking HTTP client for the upstream statistics API.
//!
//! Every request goes through [`ApiClient::request`], which retries
//! transient failures (timeouts, connection errors, HTTP 429 and 5xx)
//! with exponential backoff and fails fast on other 4xx responses.
//! The network layer sits behind the [`Transport`] trait so the retry
//! and classification logic can be driven without a live server.

use std::thread;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Low-level failure reported by a [`Transport`]. All variants are transient.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request failed: {0}")]
    Other(String),
}

/// Cause of a failed attempt that is worth retrying.
#[derive(Error, Debug)]
pub enum TransientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("HTTP {status}: {snippet}")]
    Status { status: u16, snippet: String },
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to fetch {url} after {attempts} attempts. Last error: {last}")]
    RequestExhausted {
        url: String,
        attempts: u32,
        #[source]
        last: TransientError,
    },
    #[error("Client error {status} for {url}: {snippet}")]
    Client {
        url: String,
        status: u16,
        snippet: String,
    },
    #[error("Invalid JSON response from {url}: {source}")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Status line and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Performs one GET request. No retries, no status interpretation.
pub trait Transport {
    fn get(&self, url: &str, params: &[(String, String)]) -> Result<RawResponse, TransportError>;
}

/// Production transport backed by a `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str, params: &[(String, String)]) -> Result<RawResponse, TransportError> {
        let mut request = self.agent.get(url);
        for (key, value) in params {
            request = request.query(key, value);
        }

        let mut response = request.call().map_err(classify_ureq_error)?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(classify_ureq_error)?;
        Ok(RawResponse { status, body })
    }
}

fn classify_ureq_error(e: ureq::Error) -> TransportError {
    match e {
        ureq::Error::Timeout(_) => TransportError::Timeout(e.to_string()),
        ureq::Error::Io(_) | ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => {
            TransportError::Connection(e.to_string())
        }
        other => TransportError::Other(other.to_string()),
    }
}

/// Exponential backoff schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Wait before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier applied to the wait after each further failure.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (0-based): `initial * multiplier^attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::try_from_secs_f64(secs).unwrap_or(self.initial_delay)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Sent as the `limit` query parameter on every endpoint request.
    pub page_limit: u32,
    pub retry: RetryPolicy,
}

pub struct ApiClient<T: Transport = UreqTransport> {
    config: ClientConfig,
    transport: T,
}

impl ApiClient<UreqTransport> {
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.timeout);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_transport(mut config: ClientConfig, transport: T) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        log::debug!("API client for {}", config.base_url);
        Self { config, transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Full URL for an endpoint path: leading `/` and trailing `.json` are added when missing.
    pub fn endpoint_url(&self, path: &str) -> String {
        let mut url = self.config.base_url.clone();
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);
        if !url.ends_with(".json") {
            url.push_str(".json");
        }
        url
    }

    /// GET an endpoint path with the configured page limit.
    pub fn get(&self, path: &str) -> Result<Value, ApiError> {
        let url = self.endpoint_url(path);
        let params = [("limit".to_string(), self.config.page_limit.to_string())];
        self.request(&url, &params)
    }

    /// GET `url` and parse the body as JSON, retrying transient failures.
    pub fn request(&self, url: &str, params: &[(String, String)]) -> Result<Value, ApiError> {
        let policy = &self.config.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            log::debug!("GET {url} (attempt {}/{max_attempts})", attempt + 1);

            let failure = match self.transport.get(url, params) {
                Ok(resp) if (200..300).contains(&resp.status) => {
                    return serde_json::from_str(&resp.body).map_err(|source| {
                        log::error!("Invalid JSON from {url}: {source}");
                        ApiError::InvalidJson {
                            url: url.to_string(),
                            source,
                        }
                    });
                }
                Ok(resp) if (400..500).contains(&resp.status) && resp.status != 429 => {
                    log::error!("GET {url} returned {}", resp.status);
                    return Err(ApiError::Client {
                        url: url.to_string(),
                        status: resp.status,
                        snippet: snippet(&resp.body),
                    });
                }
                Ok(resp) => TransientError::Status {
                    status: resp.status,
                    snippet: snippet(&resp.body),
                },
                Err(e) => TransientError::Transport(e),
            };

            if attempt + 1 >= max_attempts {
                log::error!("GET {url} failed after {max_attempts} attempts: {failure}");
                return Err(ApiError::RequestExhausted {
                    url: url.to_string(),
                    attempts: max_attempts,
                    last: failure,
                });
            }

            let delay = policy.delay_for_attempt(attempt);
            log::warn!(
                "GET {url} failed (attempt {}/{max_attempts}): {failure}. Retrying in {delay:?}...",
                attempt + 1,
            );
            thread::sleep(delay);
            attempt += 1;
        }
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}

/// Canned transports for driving the client in tests.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::cell::RefCell;

    pub fn test_config() -> ClientConfig {
        ClientConfig {
            base_url: "http://api.test/f1".to_string(),
            timeout: Duration::from_secs(1),
            page_limit: 100,
            retry: RetryPolicy {
                max_attempts: 3,
                initial_delay: Duration::ZERO,
                multiplier: 2.0,
            },
        }
    }

    /// Answers by URL suffix; unknown URLs get a 404.
    #[derive(Default)]
    pub struct RouteTransport {
        routes: Vec<(String, Result<RawResponse, TransportError>)>,
        pub calls: RefCell<Vec<String>>,
    }

    impl RouteTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn json(mut self, suffix: &str, body: Value) -> Self {
            let resp = RawResponse {
                status: 200,
                body: body.to_string(),
            };
            self.routes.push((suffix.to_string(), Ok(resp)));
            self
        }

        pub fn status(mut self, suffix: &str, status: u16) -> Self {
            let resp = RawResponse {
                status,
                body: String::new(),
            };
            self.routes.push((suffix.to_string(), Ok(resp)));
            self
        }

        pub fn unreachable(mut self, suffix: &str) -> Self {
            self.routes.push((
                suffix.to_string(),
                Err(TransportError::Connection("refused".to_string())),
            ));
            self
        }

        pub fn call_count(&self, suffix: &str) -> usize {
            self.calls.borrow().iter().filter(|u| u.ends_with(suffix)).count()
        }
    }

    impl Transport for RouteTransport {
        fn get(&self, url: &str, _params: &[(String, String)]) -> Result<RawResponse, TransportError> {
            self.calls.borrow_mut().push(url.to_string());
            self.routes
                .iter()
                .find(|(suffix, _)| url.ends_with(suffix.as_str()))
                .map(|(_, resp)| resp.clone())
                .unwrap_or(Ok(RawResponse {
                    status: 404,
                    body: "not found".to_string(),
                }))
        }
    }

    pub fn client(transport: RouteTransport) -> ApiClient<RouteTransport> {
        ApiClient::with_transport(test_config(), transport)
    }
}

#[cfg(test)]
mod tests {
    use super::fake::test_config;
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays a fixed sequence of outcomes, one per call.
    struct ScriptedTransport {
        script: RefCell<VecDeque<Result<RawResponse, TransportError>>>,
        calls: RefCell<Vec<(String, Vec<(String, String)>)>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<RawResponse, TransportError>>) -> Self {
            Self {
                script: RefCell::new(script.into()),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&self, url: &str, params: &[(String, String)]) -> Result<RawResponse, TransportError> {
            self.calls.borrow_mut().push((url.to_string(), params.to_vec()));
            self.script
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(TransportError::Other("script exhausted".to_string())))
        }
    }

    fn ok(body: &str) -> Result<RawResponse, TransportError> {
        Ok(RawResponse {
            status: 200,
            body: body.to_string(),
        })
    }

    fn status(code: u16) -> Result<RawResponse, TransportError> {
        Ok(RawResponse {
            status: code,
            body: format!("status {code}"),
        })
    }

    #[test]
    fn test_success_first_try() {
        let client = ApiClient::with_transport(test_config(), ScriptedTransport::new(vec![ok(r#"{"a":1}"#)]));
        let value = client.request("http://x/y.json", &[]).unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(client.transport.call_count(), 1);
    }

    #[test]
    fn test_retries_timeout_then_succeeds() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Timeout("slow".to_string())),
            status(503),
            ok("{}"),
        ]);
        let client = ApiClient::with_transport(test_config(), transport);
        assert!(client.request("http://x/y.json", &[]).is_ok());
        assert_eq!(client.transport.call_count(), 3);
    }

    #[test]
    fn test_rate_limit_is_retried() {
        let transport = ScriptedTransport::new(vec![status(429), ok("{}")]);
        let client = ApiClient::with_transport(test_config(), transport);
        assert!(client.request("http://x/y.json", &[]).is_ok());
        assert_eq!(client.transport.call_count(), 2);
    }

    #[test]
    fn test_client_error_fails_immediately() {
        let transport = ScriptedTransport::new(vec![status(404), ok("{}")]);
        let client = ApiClient::with_transport(test_config(), transport);
        let err = client.request("http://x/y.json", &[]).unwrap_err();
        assert!(matches!(err, ApiError::Client { status: 404, .. }));
        assert_eq!(client.transport.call_count(), 1);
    }

    #[test]
    fn test_exhaustion_reports_last_cause() {
        let transport = ScriptedTransport::new(vec![
            status(500),
            Err(TransportError::Timeout("slow".to_string())),
            Err(TransportError::Connection("reset".to_string())),
        ]);
        let client = ApiClient::with_transport(test_config(), transport);
        let err = client.request("http://x/y.json", &[]).unwrap_err();
        match &err {
            ApiError::RequestExhausted { attempts, last, .. } => {
                assert_eq!(*attempts, 3);
                assert!(matches!(
                    last,
                    TransientError::Transport(TransportError::Connection(_))
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("after 3 attempts"));
        assert_eq!(client.transport.call_count(), 3);
    }

    #[test]
    fn test_invalid_json_is_not_retried() {
        let transport = ScriptedTransport::new(vec![ok("<html>"), ok("{}")]);
        let client = ApiClient::with_transport(test_config(), transport);
        let err = client.request("http://x/y.json", &[]).unwrap_err();
        assert!(matches!(err, ApiError::InvalidJson { .. }));
        assert_eq!(client.transport.call_count(), 1);
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn test_endpoint_url_and_limit_param() {
        let mut config = test_config();
        config.base_url = "http://api.test/f1/".to_string();
        let client = ApiClient::with_transport(config, ScriptedTransport::new(vec![ok("{}")]));
        assert_eq!(client.endpoint_url("2023"), "http://api.test/f1/2023.json");
        assert_eq!(client.endpoint_url("/2023/5/results"), "http://api.test/f1/2023/5/results.json");
        assert_eq!(client.endpoint_url("/2023.json"), "http://api.test/f1/2023.json");

        client.get("/2023").unwrap();
        let calls = client.transport.calls.borrow();
        assert_eq!(calls[0].0, "http://api.test/f1/2023.json");
        assert_eq!(calls[0].1, vec![("limit".to_string(), "100".to_string())]);
    }
}
