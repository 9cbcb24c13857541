use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::stock::StockShortfall;
use crate::services::transactions::BatchReport;

/// Error body returned to HTTP callers.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Per-field, per-rule or per-row details when the error carries them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// RFC 3339 timestamp when the error was rendered
    pub timestamp: String,
}

/// A single field-level schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {}", join_display(.0))]
    ValidationError(Vec<FieldViolation>),

    #[error("Business rule violation: {}", .0.join("; "))]
    BusinessRule(Vec<String>),

    #[error("Insufficient stock: {}", join_display(.0))]
    InsufficientStock(Vec<StockShortfall>),

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Batch rejected: {} of {} rows failed", .0.failed.len(), .0.total())]
    BatchRejected(BatchReport),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// Wraps a database failure; used with `map_err`.
    pub fn db_error(error: DbErr) -> Self {
        ServiceError::DatabaseError(error)
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::ValidationError(vec![FieldViolation::new(field, message)])
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::BusinessRule(_) | Self::BatchRejected(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InsufficientStock(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PolicyViolation(_) => StatusCode::CONFLICT,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Infrastructure errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Structured detail payload: field violations, rule messages, shortfalls or batch rows.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::ValidationError(violations) => serde_json::to_value(violations).ok(),
            Self::BusinessRule(rules) => serde_json::to_value(rules).ok(),
            Self::InsufficientStock(shortfalls) => serde_json::to_value(shortfalls).ok(),
            Self::BatchRejected(report) => serde_json::to_value(&report.failed).ok(),
            _ => None,
        }
    }

    /// True for errors caused by the caller's input rather than the infrastructure.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut violations: Vec<FieldViolation> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    FieldViolation::new(field, message)
                })
            })
            .collect();
        violations.sort_by(|a, b| a.field.cmp(&b.field).then(a.message.cmp(&b.message)));
        ServiceError::ValidationError(violations)
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::validation("body", err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: self.details(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use uuid::Uuid;

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::validation("operator", "required").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::BusinessRule(vec!["x".into()]).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::PolicyViolation("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::InsufficientStock(vec![]).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_message_hides_database_details() {
        let err = ServiceError::DatabaseError(DbErr::Custom("password=secret".into()));
        assert_eq!(err.response_message(), "Database error");

        assert_eq!(
            ServiceError::NotFound("Item 42 not found".into()).response_message(),
            "Not found: Item 42 not found"
        );
    }

    #[test]
    fn validation_error_lists_every_field() {
        let err = ServiceError::ValidationError(vec![
            FieldViolation::new("operator", "must be 1-50 characters"),
            FieldViolation::new("quantity", "must be greater than 0"),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation error: operator: must be 1-50 characters; quantity: must be greater than 0"
        );
    }

    #[tokio::test]
    async fn insufficient_stock_response_carries_shortfalls() {
        let shortfall = StockShortfall {
            item_id: Uuid::nil(),
            location_id: Uuid::nil(),
            item_name: Some("A4 paper".into()),
            location_name: None,
            required: 150,
            available: 100,
        };
        let response = ServiceError::InsufficientStock(vec![shortfall]).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        let details = payload.details.expect("details present");
        assert_eq!(details[0]["required"], 150);
        assert_eq!(details[0]["available"], 100);
    }
}
