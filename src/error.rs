use axum::{http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

pub type RoutingResult<T> = Result<T, RoutingError>;

/// Terminal outcomes of a routing call.
///
/// Each variant knows its HTTP status and whether it represents a failure
/// worth logging. `FinishedRouting` is a success-class terminal signal that
/// travels on the error path so the pipeline stops early.
#[derive(Error, Debug)]
pub enum RoutingError {
    // ===== Preflight =====
    /// Covers both a malformed token and an owner/channel mismatch.
    #[error("Invalid receipt endpoint")]
    InvalidReceiptEndpoint,

    #[error("No such subscription")]
    NoSuchSubscription,

    // ===== Request Shape =====
    #[error("Missing crypto header: {missing}")]
    MalformedCryptoHeaders { missing: &'static str },

    #[error("Payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    // ===== Terminal, not a failure =====
    #[error("Finished Routing")]
    FinishedRouting,

    // ===== Backends =====
    #[error("Storage error: {0}")]
    StorageFailure(String),

    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),
}

impl RoutingError {
    pub fn storage(err: &anyhow::Error) -> Self {
        RoutingError::StorageFailure(format!("{:#}", err))
    }

    pub fn registry(err: &anyhow::Error) -> Self {
        RoutingError::RegistryUnavailable(format!("{:#}", err))
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RoutingError::InvalidReceiptEndpoint | RoutingError::MalformedCryptoHeaders { .. } => {
                StatusCode::BAD_REQUEST
            }
            RoutingError::NoSuchSubscription => StatusCode::NOT_FOUND,
            RoutingError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RoutingError::FinishedRouting => StatusCode::CREATED,
            RoutingError::StorageFailure(_) | RoutingError::RegistryUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Whether this outcome should be logged as a failure
    pub fn should_log(&self) -> bool {
        !matches!(
            self,
            RoutingError::InvalidReceiptEndpoint | RoutingError::FinishedRouting
        )
    }

    /// True for outcomes that end routing without anything having gone wrong
    pub fn is_success(&self) -> bool {
        self.status_code().is_success()
    }

    /// Get error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            RoutingError::InvalidReceiptEndpoint => "INVALID_RECEIPT_ENDPOINT",
            RoutingError::NoSuchSubscription => "NO_SUCH_SUBSCRIPTION",
            RoutingError::MalformedCryptoHeaders { .. } => "MISSING_CRYPTO_HEADERS",
            RoutingError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            RoutingError::FinishedRouting => "FINISHED_ROUTING",
            RoutingError::StorageFailure(_) => "STORAGE_ERROR",
            RoutingError::RegistryUnavailable(_) => "REGISTRY_ERROR",
        }
    }

    /// Response body text. Backend details never reach the client.
    pub fn user_message(&self) -> String {
        match self {
            RoutingError::FinishedRouting => String::new(),
            RoutingError::StorageFailure(_) | RoutingError::RegistryUnavailable(_) => {
                "Retry Request".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Log this error with appropriate level and context
    pub fn log(&self) {
        if !self.should_log() {
            return;
        }

        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(
                error = %self,
                error_code = %code,
                status = %status.as_u16(),
                "Routing failed"
            );
        } else {
            tracing::debug!(
                error = %self,
                error_code = %code,
                status = %status.as_u16(),
                "Routing rejected"
            );
        }
    }
}

impl IntoResponse for RoutingError {
    fn into_response(self) -> axum::response::Response {
        self.log();

        let status = self.status_code();

        if self.is_success() {
            return status.into_response();
        }

        let response_body = json!({
            "error": self.user_message(),
            "error_code": self.error_code(),
            "status": status.as_u16(),
        });

        (status, axum::Json(response_body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_logging_table() {
        let cases = [
            (RoutingError::InvalidReceiptEndpoint, 400, false),
            (RoutingError::NoSuchSubscription, 404, true),
            (RoutingError::FinishedRouting, 201, false),
            (
                RoutingError::MalformedCryptoHeaders {
                    missing: "encryption",
                },
                400,
                true,
            ),
            (RoutingError::StorageFailure("down".into()), 503, true),
            (RoutingError::RegistryUnavailable("down".into()), 503, true),
        ];

        for (err, status, logged) in cases {
            assert_eq!(err.status_code().as_u16(), status, "{err}");
            assert_eq!(err.should_log(), logged, "{err}");
        }
    }

    #[test]
    fn test_finished_routing_has_empty_body() {
        assert_eq!(RoutingError::FinishedRouting.user_message(), "");
        assert!(RoutingError::FinishedRouting.is_success());
    }

    #[test]
    fn test_backend_details_are_hidden() {
        let err = RoutingError::StorageFailure("redis://secret-host refused".into());
        assert_eq!(err.user_message(), "Retry Request");
    }

    #[tokio::test]
    async fn test_finished_routing_response() {
        let response = RoutingError::FinishedRouting.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }
}
