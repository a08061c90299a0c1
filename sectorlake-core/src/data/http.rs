//! Blocking HTTP client with bounded retries and the circuit breaker.
//!
//! Both external sources go through here so the retry policy, timeout and
//! breaker state are shared across the roster fetch and every bar fetch.

use super::circuit_breaker::CircuitBreaker;
use super::provider::DataError;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Upper bound on a server-requested `retry-after` wait.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(120);

/// Timeout and retry settings for outbound requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
    pub user_agent: String,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt number `attempt` (1-based retry count).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt - 1))
    }

    /// Wait before retry `attempt`: the backoff, or the server's
    /// `retry-after` (capped at `MAX_RETRY_AFTER`) when that is longer.
    pub fn wait_before(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.delay_for(attempt);
        match retry_after {
            Some(requested) => backoff.max(requested.min(MAX_RETRY_AFTER)),
            None => backoff,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::blocking::Client,
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
}

impl HttpClient {
    pub fn new(policy: RetryPolicy, breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(policy.timeout)
            .user_agent(policy.user_agent.clone())
            .build()
            .map_err(|e| DataError::SourceUnavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            breaker,
            policy,
        })
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// GET `url` and return the body as text.
    ///
    /// 404 is returned as `NotFound` without retrying; 401/403 are not
    /// retried either (403 trips the breaker).
    pub fn get_text(&self, url: &str) -> Result<String, DataError> {
        if !self.breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;
        let mut retry_after: Option<Duration> = None;

        for attempt in 0..=self.policy.max_retries {
            if attempt > 0 {
                let delay = self.policy.wait_before(attempt, retry_after.take());
                tracing::debug!(url, attempt, ?delay, "retrying request");
                std::thread::sleep(delay);
            }

            if !self.breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    self.breaker.record_failure();
                    tracing::warn!(url, attempt, error = %e, "request failed");
                    last_error = Some(DataError::SourceUnavailable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::SourceUnavailable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::FORBIDDEN {
                self.breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::NotFound(url.to_string()));
            }

            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(DataError::SourceUnavailable(format!(
                    "HTTP {status}: authentication required"
                )));
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.breaker.record_failure();
                let requested = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(60);
                tracing::warn!(url, retry_after = requested, "rate limited");
                retry_after = Some(Duration::from_secs(requested));
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: requested,
                });
                continue;
            }

            if !status.is_success() {
                self.breaker.record_failure();
                tracing::warn!(url, %status, attempt, "unexpected status");
                last_error = Some(DataError::SourceUnavailable(format!("HTTP {status} for {url}")));
                continue;
            }

            let body = resp
                .text()
                .map_err(|e| DataError::SourceUnavailable(format!("reading body of {url}: {e}")))?;
            self.breaker.record_success();
            return Ok(body);
        }

        Err(last_error
            .unwrap_or_else(|| DataError::SourceUnavailable(format!("max retries exceeded for {url}"))))
    }
}
