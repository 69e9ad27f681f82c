//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::FailureKind;
use projections::{IngestError, SubscriptionError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// The event could not be ingested.
    Ingest(IngestError),
    /// The live query could not be opened.
    Subscription(SubscriptionError),
}

impl ApiError {
    /// Returns the HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Ingest(IngestError::Rejected(err)) => match err.kind() {
                FailureKind::DuplicateCreation
                | FailureKind::InvalidTransition
                | FailureKind::QuantityOverflow => StatusCode::CONFLICT,
                FailureKind::UnknownOrder | FailureKind::UnknownProduct => StatusCode::NOT_FOUND,
            },
            ApiError::Ingest(IngestError::ShuttingDown) | ApiError::Subscription(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::NotFound(msg) => msg,
            ApiError::Ingest(err) => err.to_string(),
            ApiError::Subscription(err) => err.to_string(),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        ApiError::Ingest(err)
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        ApiError::Subscription(err)
    }
}
