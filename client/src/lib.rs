//! Async DynamoDB client for Dyno tables.
//!
//! # Architecture
//!
//! - [`DynoClient`] - operations over declared tables (`put_item`, `query`, ...)
//! - [`ConnectConfig`] - endpoint, region and credentials
//! - [`retry`] - backoff policy; throttling and 5xx responses are retried
//! - [`sigv4`] - request signing
//!
//! Request bodies are built by `dyno_types`; this crate only moves them over
//! the wire (`POST /`, `X-Amz-Target: DynamoDB_20120810.<Operation>`) and
//! classifies what comes back.
//!
//! # Error Handling
//!
//! Service errors are classified from the AWS `__type` into [`DynoError`];
//! each error reports an HTTP-like [`DynoError::status_code`].

mod connect;
mod credentials;
mod error;
mod response;
pub mod retry;
pub mod sigv4;

use std::sync::OnceLock;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::redirect::Policy;

pub use connect::{DynoClient, TARGET_PREFIX};
pub use credentials::{ConnectConfig, Credentials, DEFAULT_REGION, LOCAL_ENDPOINT};
pub use dyno_types;
pub use error::{DynoError, THROTTLING_ERRORS, error_type_of, is_throttling, short_error_type};
pub use response::{DynoResponse, ResponseData};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 100;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Process-wide pooled HTTP client.
///
/// Plain HTTP stays allowed: DynamoDB Local listens on `http://localhost:8000`.
pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        base_client_builder().build().unwrap_or_else(|e| {
            tracing::error!("Failed to build tuned HTTP client: {e}. Falling back to defaults.");
            reqwest::Client::new()
        })
    })
}

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .redirect(Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
