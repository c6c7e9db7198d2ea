use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{error::DbErr, TransactionError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::request_status::InvalidTransition;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body shared by every JSON and HTML endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "ok": false,
    "error": "already_requested",
    "message": "An open request already exists for this service in this room",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// Always false
    pub ok: bool,
    /// Machine-readable error code (e.g. "empty_cart", "bad_state")
    #[schema(example = "bad_state")]
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("No hotel is associated with this account")]
    NoTenant,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Item {0} is not a service")]
    NotAService(Uuid),

    #[error("An open request already exists for service item {0} in this room")]
    DuplicateRequest(Uuid),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(#[from] InvalidTransition),

    #[error("Resource busy: {0}")]
    Busy(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<tera::Error> for ServiceError {
    fn from(err: tera::Error) -> Self {
        ServiceError::TemplateError(err.to_string())
    }
}

impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(e) => ServiceError::DatabaseError(e),
            TransactionError::Transaction(e) => e,
        }
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::EmptyCart | Self::NotAService(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::NoTenant => StatusCode::FORBIDDEN,
            Self::DuplicateRequest(_)
            | Self::InvalidStateTransition(_)
            | Self::Busy(_)
            | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::DatabaseError(_)
            | Self::TemplateError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code carried in the `error` field of the response body.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NoTenant => "no_hotel",
            Self::EmptyCart => "empty_cart",
            Self::NotAService(_) => "not_a_service",
            Self::DuplicateRequest(_) => "already_requested",
            // Losing a race for a row reads the same as arriving after the winner.
            Self::InvalidStateTransition(_) | Self::Busy(_) => "bad_state",
            Self::Conflict(_) => "conflict",
            Self::TemplateError(_) | Self::InternalError(_) | Self::Other(_) => "internal_error",
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::TemplateError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Whether the error is a conflict the caller may observe during normal concurrent use.
    pub fn is_conflict(&self) -> bool {
        self.status_code() == StatusCode::CONFLICT
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            ok: false,
            error: self.error_code().to_string(),
            message: self.response_message(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

/// Returns true when the database rejected a write because of a unique index.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::request::RequestStatus;
    use crate::services::request_status::RequestAction;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn error_response_carries_code_and_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::EmptyCart.into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(!payload.ok);
        assert_eq!(payload.error, "empty_cart");
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
    }

    #[test]
    fn domain_errors_map_to_contract_codes() {
        let item = Uuid::new_v4();
        let cases = [
            (ServiceError::EmptyCart, StatusCode::BAD_REQUEST, "empty_cart"),
            (
                ServiceError::NotAService(item),
                StatusCode::BAD_REQUEST,
                "not_a_service",
            ),
            (
                ServiceError::DuplicateRequest(item),
                StatusCode::CONFLICT,
                "already_requested",
            ),
            (
                ServiceError::InvalidStateTransition(InvalidTransition {
                    from: RequestStatus::Completed,
                    action: RequestAction::Cancel,
                }),
                StatusCode::CONFLICT,
                "bad_state",
            ),
            (
                ServiceError::Busy("request".into()),
                StatusCode::CONFLICT,
                "bad_state",
            ),
            (ServiceError::NoTenant, StatusCode::FORBIDDEN, "no_hotel"),
            (
                ServiceError::NotFound("room".into()),
                StatusCode::NOT_FOUND,
                "not_found",
            ),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status_code(), status, "{err}");
            assert_eq!(err.error_code(), code, "{err}");
        }
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::InternalError("pool exhausted".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("secret".into())).response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::NotFound("Room not found".into()).response_message(),
            "Not found: Room not found"
        );
    }

    #[test]
    fn transaction_errors_unwrap_to_service_errors() {
        let inner: ServiceError =
            TransactionError::Transaction(ServiceError::EmptyCart).into();
        assert!(matches!(inner, ServiceError::EmptyCart));

        let conn: ServiceError =
            TransactionError::<ServiceError>::Connection(DbErr::Custom("gone".into())).into();
        assert!(matches!(conn, ServiceError::DatabaseError(_)));
    }
}
