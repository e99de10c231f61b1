//! Bounded, classification-aware retries for model calls.
//!
//! The loop is explicit: a pure [`classify`] decides whether an attempt
//! succeeded, failed for good, or may be retried, and a pure
//! [`retry_delay`] decides how long to wait. Only the sleep is async.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::ai::error::AiError;
use crate::ai::transport::{HttpRequest, HttpResponse, Transport, TransportError};

/// Total attempts for one logical call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Upper bound on any single delay, server-supplied or computed.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Why an attempt may be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    /// HTTP 429, with the server's requested delay if it sent one.
    RateLimited {
        /// Parsed `retry-after-ms` / `retry-after` value.
        retry_after: Option<Duration>,
        /// Response body.
        message: String,
    },
    /// HTTP 408.
    RequestTimeout(String),
    /// HTTP 5xx.
    ServerError {
        /// Status code.
        status: u16,
        /// Response body.
        message: String,
    },
    /// Connection failure or transport timeout.
    Network(TransportError),
}

impl RetryReason {
    fn describe(&self) -> String {
        match self {
            Self::RateLimited { message, .. } => format!("HTTP 429: {message}"),
            Self::RequestTimeout(message) => format!("HTTP 408: {message}"),
            Self::ServerError { status, message } => format!("HTTP {status}: {message}"),
            Self::Network(e) => e.to_string(),
        }
    }
}

/// Outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// 2xx.
    Success,
    /// Worth another attempt.
    Retryable(RetryReason),
    /// Any other 4xx or non-network failure.
    Terminal,
}

/// Classifies the result of one attempt.
#[must_use]
pub fn classify(outcome: &Result<HttpResponse, TransportError>) -> Classification {
    match outcome {
        Ok(response) if response.is_success() => Classification::Success,
        Ok(response) => match response.status {
            429 => Classification::Retryable(RetryReason::RateLimited {
                retry_after: parse_retry_after(response, Utc::now()),
                message: response.body.clone(),
            }),
            408 => Classification::Retryable(RetryReason::RequestTimeout(response.body.clone())),
            status @ 500..=599 => Classification::Retryable(RetryReason::ServerError {
                status,
                message: response.body.clone(),
            }),
            _ => Classification::Terminal,
        },
        Err(e) if e.is_network() => Classification::Retryable(RetryReason::Network(e.clone())),
        Err(_) => Classification::Terminal,
    }
}

/// Reads the server's requested delay from `retry-after-ms` or
/// `retry-after` (seconds or an HTTP date relative to `now`).
#[must_use]
pub fn parse_retry_after(response: &HttpResponse, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(ms) = response
        .header("retry-after-ms")
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
    {
        return Some(Duration::from_millis(ms.round() as u64));
    }

    let value = response.header("retry-after")?.trim();
    if let Ok(seconds) = value.parse::<f64>() {
        return (seconds.is_finite() && seconds >= 0.0)
            .then(|| Duration::from_secs_f64(seconds.min(86_400.0)));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let wait = at.signed_duration_since(now).to_std().unwrap_or(Duration::ZERO);
    Some(wait)
}

/// Delay before the attempt following failed attempt `attempt` (1-based).
///
/// Rate limits honour the server delay, else back off exponentially
/// (2s, 4s, ...). Other retryable failures wait `attempt` seconds.
#[must_use]
pub fn retry_delay(reason: &RetryReason, attempt: u32, max_delay: Duration) -> Duration {
    let delay = match reason {
        RetryReason::RateLimited {
            retry_after: Some(server),
            ..
        } => *server,
        RetryReason::RateLimited { .. } => {
            Duration::from_secs(2_u64.saturating_pow(attempt.min(16)))
        }
        RetryReason::RequestTimeout(_)
        | RetryReason::ServerError { .. }
        | RetryReason::Network(_) => Duration::from_secs(u64::from(attempt)),
    };
    delay.min(max_delay)
}

/// Per-call progress through the retry loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempt: u32,
    /// Last retryable failure.
    pub last_failure: Option<RetryReason>,
    /// Delay computed after the last failure.
    pub delay: Duration,
}

/// Retry bounds for one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Clamped to
    /// `1..=DEFAULT_MAX_ATTEMPTS` when the policy runs.
    pub max_attempts: u32,
    /// Cap on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Runs `attempt_fn` until it succeeds, fails terminally, or attempts
    /// run out.
    ///
    /// `attempt_fn` receives the 1-based attempt number and must build a
    /// fresh request each time. Terminal HTTP responses are returned as
    /// `Ok` so the caller can interpret them; exhausted retries become
    /// [`AiError::RateLimited`] or [`AiError::TransientTransport`].
    pub async fn execute<F, Fut>(&self, mut attempt_fn: F) -> Result<HttpResponse, AiError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<HttpResponse, TransportError>>,
    {
        let max_attempts = self.max_attempts.clamp(1, DEFAULT_MAX_ATTEMPTS);
        let mut state = RetryState::default();

        loop {
            state.attempt += 1;
            let outcome = attempt_fn(state.attempt).await;

            let reason = match classify(&outcome) {
                Classification::Success | Classification::Terminal => {
                    return outcome.map_err(|e| AiError::Fatal(e.to_string()));
                }
                Classification::Retryable(reason) => reason,
            };

            if state.attempt >= max_attempts {
                warn!(
                    attempts = state.attempt,
                    reason = %reason.describe(),
                    "Retries exhausted"
                );
                return Err(exhausted(state.attempt, &reason));
            }

            state.delay = retry_delay(&reason, state.attempt, self.max_delay);
            debug!(
                attempt = state.attempt,
                delay_ms = state.delay.as_millis() as u64,
                reason = %reason.describe(),
                "Retrying after retryable failure"
            );
            state.last_failure = Some(reason);
            tokio::time::sleep(state.delay).await;
        }
    }

    /// Sends `request` through `transport` with retries.
    pub async fn send(
        &self,
        transport: &dyn Transport,
        request: &HttpRequest,
    ) -> Result<HttpResponse, AiError> {
        self.execute(|_| transport.send(request.clone())).await
    }
}

fn exhausted(attempts: u32, reason: &RetryReason) -> AiError {
    let message = reason.describe();
    match reason {
        RetryReason::RateLimited { .. } => AiError::RateLimited { attempts, message },
        _ => AiError::TransientTransport { attempts, message },
    }
}
