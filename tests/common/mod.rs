//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use dyno_client::retry::RetryConfig;
use dyno_client::{ConnectConfig, DynoClient, TARGET_PREFIX};
use dyno_config::DynoConfig;
use dyno_types::Record;
use serde_json::Value;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A table with two schemas, one global index and a counter.
pub const SAMPLE_CONFIG: &str = r#"
[connection]
endpoint = "http://localhost:8000"

[retry]
max_retries = 2
initial_delay_ms = 1
max_delay_ms = 5
jitter = 0.0

[[tables]]
name = "sample"
deletion_protection = false

[[tables.indexes]]
name = "gsi1"

[[tables.schemas]]
name = "User"
pk = "user#{id}"
sk = "user"
required = ["id"]

[[tables.schemas.indexes]]
name = "gsi1"
pk = "email#{email}"
sk = "user"
required = ["email"]

[[tables.schemas.attributes]]
name = "id"
type = "string"

[[tables.schemas.attributes]]
name = "email"
type = "string"
optional = true

[[tables.schemas.attributes]]
name = "age"
type = "int"
optional = true

[[tables.schemas.auto_increments]]
name = "next_order"
start = 100

[[tables.schemas]]
name = "Order"
pk = "user#{user}"
sk = "order#{order}"

[[tables.schemas.attributes]]
name = "user"
type = "string"

[[tables.schemas.attributes]]
name = "order"
type = "int"

[[tables.schemas.attributes]]
name = "total"
type = "float"
optional = true
"#;

pub fn sample_config() -> DynoConfig {
    DynoConfig::parse(SAMPLE_CONFIG, Path::new("sample.toml")).unwrap()
}

pub fn fast_retry_config() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        jitter_factor: 0.0,
    }
}

/// Start a mock server standing in for DynamoDB.
pub async fn start_dynamo_mock() -> MockServer {
    MockServer::start().await
}

pub fn client_for(server: &MockServer) -> DynoClient {
    DynoClient::new(ConnectConfig::local(Some(&server.uri())).unwrap()).with_retry(fast_retry_config())
}

pub fn target(operation: &str) -> String {
    format!("{TARGET_PREFIX}.{operation}")
}

/// Mock any request for `operation` with a fixed JSON response.
pub async fn mount_operation(server: &MockServer, operation: &str, status: u16, body: Value) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("x-amz-target", target(operation).as_str()))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

/// A service error body in the shape DynamoDB returns.
pub fn service_error(error_type: &str, message: &str) -> Value {
    serde_json::json!({
        "__type": format!("com.amazonaws.dynamodb.v20120810#{error_type}"),
        "message": message,
    })
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
