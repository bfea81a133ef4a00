//! Retry policy with exponential backoff for DynamoDB requests.
//!
//! # Retry Policy
//!
//! - Max retries: 3 (4 total attempts)
//! - Initial delay: 50ms
//! - Max delay: 5 seconds
//! - Jitter: down-jitter up to 25% (multiplier in [0.75, 1.0])
//!
//! # Retryable Conditions
//!
//! - HTTP 429 and 5xx
//! - HTTP 400 whose `__type` is a throttling error
//! - Connection and timeout errors
//!
//! Every attempt is built (and signed) anew by the caller's closure.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use tokio::time::sleep;

use crate::error::{DynoError, error_type_of, is_throttling};
use crate::read_capped_error_body;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries (not counting the initial request).
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Jitter factor for down-jitter (0.25 = up to 25% reduction).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            jitter_factor: 0.25,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no backoff.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Determine if an error response is retryable.
#[must_use]
pub fn should_retry(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return true;
    }
    status == StatusCode::BAD_REQUEST && error_type_of(body).is_some_and(|t| is_throttling(&t))
}

/// Calculate retry delay with exponential backoff and jitter.
///
/// `backoff_step` is 0 before the first retry, 1 before the second, etc.
#[must_use]
pub fn calculate_retry_delay(backoff_step: u32, config: &RetryConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(backoff_step as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    // NaN or infinite factors would make the delay non-finite.
    let factor = if config.jitter_factor.is_finite() {
        config.jitter_factor.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let jitter = 1.0 - rand::random::<f64>() * factor;
    Duration::from_secs_f64(capped * jitter)
}

/// Outcome of a retried request.
///
/// Success and failure are distinct variants so an error response can never
/// be decoded as a result.
#[derive(Debug)]
pub enum RetryOutcome {
    /// 2xx response.
    Success(Response),
    /// Error response after exhausting retries, body already read.
    ServiceError { status: StatusCode, body: String },
    /// Transport failure after exhausting retries.
    ConnectionError { attempts: u32, source: reqwest::Error },
    /// Transport failure that cannot be retried.
    NonRetryable(reqwest::Error),
    /// The request could not be built.
    NotSent(DynoError),
}

impl RetryOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Send a request with automatic retries.
///
/// `build_request` is called once per attempt.
pub async fn send_with_retry<F>(build_request: F, config: &RetryConfig) -> RetryOutcome
where
    F: Fn() -> Result<RequestBuilder, DynoError>,
{
    let mut attempt = 0;
    loop {
        let request = match build_request() {
            Ok(request) => request,
            Err(e) => return RetryOutcome::NotSent(e),
        };
        let can_retry = attempt < config.max_retries;

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return RetryOutcome::Success(response);
                }

                let body = read_capped_error_body(response).await;
                if can_retry && should_retry(status, &body) {
                    let delay = calculate_retry_delay(attempt, config);
                    tracing::warn!(
                        status = %status,
                        retry_count = attempt + 1,
                        delay_ms = delay.as_millis(),
                        "Retrying request after error status"
                    );
                    sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return RetryOutcome::ServiceError { status, body };
            }
            Err(e) => {
                if !is_retryable_error(&e) {
                    if attempt == 0 {
                        return RetryOutcome::NonRetryable(e);
                    }
                    return RetryOutcome::ConnectionError {
                        attempts: attempt + 1,
                        source: e,
                    };
                }
                if !can_retry {
                    return RetryOutcome::ConnectionError {
                        attempts: attempt + 1,
                        source: e,
                    };
                }
                let delay = calculate_retry_delay(attempt, config);
                tracing::warn!(
                    error = %e,
                    retry_count = attempt + 1,
                    delay_ms = delay.as_millis(),
                    "Retrying request after connection error"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}
