use dyno_types::{DefinitionError, TableError};
use hmac::digest::InvalidLength;
use serde::Deserialize;
use thiserror::Error;

/// Error types the service reports as throttling; these are retried.
pub const THROTTLING_ERRORS: [&str; 4] = [
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
    "LimitExceededException",
];

#[derive(Debug, Error)]
pub enum DynoError {
    #[error("conditional check failed: {message}")]
    ConditionalCheckFailed { message: String },
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("table {0} is delete protected")]
    DeleteProtected(String),
    #[error("resource in use: {message}")]
    ResourceInUse { message: String },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("validation failed: {message}")]
    Validation { message: String },
    #[error("transaction canceled: {message}")]
    TransactionCanceled { message: String, reasons: Vec<String> },
    #[error("throttled: {message}")]
    Throttled { message: String },
    #[error("service error {status} ({error_type}): {message}")]
    Service {
        status: u16,
        error_type: String,
        message: String,
    },
    #[error("request failed after {attempts} attempts: {source}")]
    Connection { attempts: u32, source: reqwest::Error },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to encode or decode a body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("invalid endpoint {endpoint}: {source}")]
    Endpoint { endpoint: String, source: url::ParseError },
    #[error("no credentials: set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY, or an explicit endpoint")]
    MissingCredentials,
    #[error("request signing failed: {0}")]
    Signing(#[from] InvalidLength),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServiceErrorBody {
    #[serde(rename = "__type")]
    error_type: String,
    #[serde(alias = "Message")]
    message: String,
    #[serde(rename = "CancellationReasons")]
    cancellation_reasons: Vec<CancellationReason>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct CancellationReason {
    code: Option<String>,
}

/// Short error type from an AWS `__type` such as
/// `com.amazonaws.dynamodb.v20120810#ResourceNotFoundException`.
#[must_use]
pub fn short_error_type(error_type: &str) -> &str {
    error_type.rsplit('#').next().unwrap_or(error_type)
}

#[must_use]
pub fn is_throttling(error_type: &str) -> bool {
    THROTTLING_ERRORS.contains(&short_error_type(error_type))
}

/// Error type named in a service error body, if the body is JSON.
#[must_use]
pub fn error_type_of(body: &str) -> Option<String> {
    serde_json::from_str::<ServiceErrorBody>(body)
        .ok()
        .map(|parsed| short_error_type(&parsed.error_type).to_string())
        .filter(|t| !t.is_empty())
}

impl DynoError {
    /// Classify an error response of the service.
    #[must_use]
    pub fn from_service(status: u16, body: &str) -> Self {
        let parsed: ServiceErrorBody = serde_json::from_str(body).unwrap_or_else(|_| ServiceErrorBody {
            message: body.to_string(),
            ..ServiceErrorBody::default()
        });
        let error_type = short_error_type(&parsed.error_type).to_string();
        let message = parsed.message;

        match error_type.as_str() {
            "ConditionalCheckFailedException" => Self::ConditionalCheckFailed { message },
            "ResourceInUseException" => Self::ResourceInUse { message },
            "ResourceNotFoundException" => Self::NotFound { message },
            "ValidationException" => Self::Validation { message },
            "TransactionCanceledException" => Self::TransactionCanceled {
                message,
                reasons: parsed
                    .cancellation_reasons
                    .into_iter()
                    .map(|reason| reason.code.unwrap_or_else(|| "None".to_string()))
                    .collect(),
            },
            t if is_throttling(t) => Self::Throttled { message },
            _ if status == 429 => Self::Throttled { message },
            _ => Self::Service {
                status,
                error_type,
                message,
            },
        }
    }

    /// HTTP-like status: 404 for missing things, 400 for rejected requests,
    /// 500 for everything that went wrong on the way.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } | Self::Table(TableError::NotDateTime(_)) => 404,
            Self::ConditionalCheckFailed { .. }
            | Self::AlreadyExists(_)
            | Self::DeleteProtected(_)
            | Self::ResourceInUse { .. }
            | Self::Validation { .. }
            | Self::TransactionCanceled { .. }
            | Self::Table(_)
            | Self::Definition(_) => 400,
            Self::Throttled { .. } => 429,
            Self::Service { status, .. } => *status,
            Self::Connection { .. }
            | Self::Transport(_)
            | Self::Decode(_)
            | Self::Endpoint { .. }
            | Self::MissingCredentials
            | Self::Signing(_) => 500,
        }
    }

    #[must_use]
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, Self::ConditionalCheckFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_service_errors() {
        let err = DynoError::from_service(
            400,
            r#"{"__type":"com.amazonaws.dynamodb.v20120810#ConditionalCheckFailedException","message":"The conditional request failed"}"#,
        );
        assert!(err.is_conditional_check_failed());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "conditional check failed: The conditional request failed");

        let err = DynoError::from_service(
            400,
            r#"{"__type":"com.amazonaws.dynamodb.v20120810#ResourceNotFoundException","Message":"Requested resource not found"}"#,
        );
        assert!(matches!(err, DynoError::NotFound { ref message } if message == "Requested resource not found"));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn classifies_throttling_and_unknown() {
        let err = DynoError::from_service(
            400,
            r#"{"__type":"com.amazonaws.dynamodb.v20120810#ProvisionedThroughputExceededException","message":"slow down"}"#,
        );
        assert!(matches!(err, DynoError::Throttled { .. }));

        let err = DynoError::from_service(503, "Service Unavailable");
        assert!(matches!(
            err,
            DynoError::Service { status: 503, ref message, .. } if message == "Service Unavailable"
        ));
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn keeps_transaction_cancellation_reasons() {
        let err = DynoError::from_service(
            400,
            r#"{"__type":"com.amazonaws.dynamodb.v20120810#TransactionCanceledException","Message":"canceled","CancellationReasons":[{"Code":"None"},{"Code":"ConditionalCheckFailed","Message":"failed"}]}"#,
        );
        match err {
            DynoError::TransactionCanceled { reasons, .. } => {
                assert_eq!(reasons, vec!["None", "ConditionalCheckFailed"]);
            }
            other => panic!("expected TransactionCanceled, got {other:?}"),
        }
    }

    #[test]
    fn throttling_types() {
        assert!(is_throttling("ThrottlingException"));
        assert!(is_throttling("com.amazonaws.dynamodb.v20120810#RequestLimitExceeded"));
        assert!(!is_throttling("ValidationException"));
        assert_eq!(
            error_type_of(r#"{"__type":"x#LimitExceededException"}"#).as_deref(),
            Some("LimitExceededException")
        );
        assert_eq!(error_type_of("not json"), None);
    }

    #[test]
    fn table_errors_map_to_status() {
        assert_eq!(DynoError::Table(TableError::NotDateTime("ttl".into())).status_code(), 404);
        assert_eq!(DynoError::Table(TableError::EmptyUpdate).status_code(), 400);
        assert_eq!(DynoError::MissingCredentials.status_code(), 500);
    }
}
