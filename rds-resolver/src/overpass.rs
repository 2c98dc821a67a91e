//! Overpass HTTP transport (spec §4.17): endpoint rotation, bounded retry
//! with linear backoff, and a request timeout standing in for the source's
//! cooperative abort signal — dropping the timed-out future cancels the
//! in-flight `reqwest` request.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::ResolverError;

pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
    "https://overpass.openstreetmap.ru/api/interpreter",
];

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(20_000);

#[derive(Debug, Clone, Deserialize)]
pub struct OverpassCenter {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: u64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub center: Option<OverpassCenter>,
    #[serde(default)]
    pub tags: std::collections::HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OverpassApiResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

/// A single Overpass endpoint request/response cycle, abstracted so tests
/// can substitute a fake transport instead of hitting the network
/// (Design Note §9's "inject ... an HTTP executor trait").
#[async_trait::async_trait]
pub trait OverpassTransport: Send + Sync {
    async fn post(&self, endpoint: &str, query: &str) -> Result<OverpassPostOutcome, reqwest::Error>;
}

pub enum OverpassPostOutcome {
    Success(Vec<OverpassElement>),
    Status(u16),
}

pub struct ReqwestOverpassTransport {
    client: reqwest::Client,
}

impl ReqwestOverpassTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestOverpassTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait::async_trait]
impl OverpassTransport for ReqwestOverpassTransport {
    async fn post(&self, endpoint: &str, query: &str) -> Result<OverpassPostOutcome, reqwest::Error> {
        let response = self
            .client
            .post(endpoint)
            .body(format!("data={query}"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(OverpassPostOutcome::Status(response.status().as_u16()));
        }
        let parsed: OverpassApiResponse = response.json().await?;
        Ok(OverpassPostOutcome::Success(parsed.elements))
    }
}

/// Endpoint rotation and retry policy around one [`OverpassTransport`].
pub struct OverpassClient<T: OverpassTransport> {
    transport: T,
    endpoints: Vec<String>,
    active: AtomicUsize,
    max_retries: u32,
    timeout: Duration,
}

impl<T: OverpassTransport> OverpassClient<T> {
    pub fn new(transport: T, endpoints: Vec<String>, max_retries: u32, timeout: Duration) -> Self {
        assert!(!endpoints.is_empty(), "overpass client needs at least one endpoint");
        Self {
            transport,
            endpoints,
            active: AtomicUsize::new(0),
            max_retries,
            timeout,
        }
    }

    /// Runs one query against up to `max_retries + 1` endpoints in
    /// rotation (spec §4.17). HTTP 429/504 and transient network/timeout
    /// failures advance to the next attempt; other statuses propagate on
    /// the final attempt only.
    pub async fn query(&self, query: &str) -> Result<Vec<OverpassElement>, ResolverError> {
        let n = self.endpoints.len();
        let base = self.active.load(Ordering::Relaxed);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(2000 * attempt as u64)).await;
            }
            let idx = (base + attempt as usize) % n;
            let endpoint = &self.endpoints[idx];
            let is_final = attempt == self.max_retries;

            let outcome = tokio::time::timeout(self.timeout, self.transport.post(endpoint, query)).await;

            match outcome {
                Ok(Ok(OverpassPostOutcome::Success(elements))) => {
                    self.active.store(idx, Ordering::Relaxed);
                    return Ok(elements);
                }
                Ok(Ok(OverpassPostOutcome::Status(status))) if status == 429 || status == 504 => {
                    warn!(endpoint, status, "overpass rate-limited or timed out, rotating endpoint");
                    last_err = Some(ResolverError::HttpStatus { status });
                }
                Ok(Ok(OverpassPostOutcome::Status(status))) => {
                    let err = ResolverError::HttpStatus { status };
                    if is_final {
                        return Err(err);
                    }
                    warn!(endpoint, status, "overpass http error, retrying");
                    last_err = Some(err);
                }
                Ok(Err(network_err)) => {
                    let err = ResolverError::Network(network_err);
                    if is_final {
                        return Err(err);
                    }
                    warn!(endpoint, error = %err, "overpass network error, retrying");
                    last_err = Some(err);
                }
                Err(_) => {
                    let err = ResolverError::Timeout(self.timeout);
                    if is_final {
                        return Err(err);
                    }
                    warn!(endpoint, "overpass request timed out, retrying");
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or(ResolverError::Parse("overpass retries exhausted".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedTransport {
        responses: Mutex<Vec<Result<OverpassPostOutcome, &'static str>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<OverpassPostOutcome, &'static str>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl OverpassTransport for ScriptedTransport {
        async fn post(&self, endpoint: &str, _query: &str) -> Result<OverpassPostOutcome, reqwest::Error> {
            self.calls.lock().unwrap().push(endpoint.to_string());
            let next = self.responses.lock().unwrap().remove(0);
            match next {
                Ok(outcome) => Ok(outcome),
                Err(_msg) => {
                    // reqwest::Error has no public constructor; timeouts and
                    // statuses cover the error paths tests need, so a forced
                    // network error is exercised via OverpassPostOutcome::Status.
                    unreachable!("scripted network errors are expressed as Status variants in these tests")
                }
            }
        }
    }

    fn endpoints() -> Vec<String> {
        vec!["https://a.example".into(), "https://b.example".into(), "https://c.example".into()]
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt_marks_endpoint_active() {
        let transport = ScriptedTransport::new(vec![Ok(OverpassPostOutcome::Success(vec![]))]);
        let client = OverpassClient::new(transport, endpoints(), 2, Duration::from_millis(20_000));
        let result = client.query("q").await.unwrap();
        assert!(result.is_empty());
        assert_eq!(client.active.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_status_rotates_to_next_endpoint() {
        let transport = ScriptedTransport::new(vec![
            Ok(OverpassPostOutcome::Status(429)),
            Ok(OverpassPostOutcome::Success(vec![])),
        ]);
        let client = OverpassClient::new(transport, endpoints(), 2, Duration::from_millis(20_000));
        client.query("q").await.unwrap();
        assert_eq!(client.active.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_final_http_error_continues_final_propagates() {
        let transport = ScriptedTransport::new(vec![
            Ok(OverpassPostOutcome::Status(500)),
            Ok(OverpassPostOutcome::Status(500)),
        ]);
        let client = OverpassClient::new(transport, endpoints(), 1, Duration::from_millis(20_000));
        let err = client.query("q").await.unwrap_err();
        assert!(matches!(err, ResolverError::HttpStatus { status: 500 }));
    }
}
