// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::AuthError;
use crate::database::DatabaseError;
use crate::tenancy::{ProvisioningError, TenancyError};

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError { message, field_errors } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });

                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }

                response
            }
            _ => json!({
                "error": true,
                "message": self.message(),
                "code": self.error_code()
            }),
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: Option<HashMap<String, String>>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UniqueViolation { table, columns } => {
                ApiError::conflict(format!("A {} record with the same {} already exists", table, columns))
            }
            DatabaseError::Filter(e) => ApiError::bad_request(e.to_string()),
            DatabaseError::Unavailable(msg) => {
                tracing::warn!("Storage unavailable: {}", msg);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::InvalidTenantName(_) | DatabaseError::ConfigMissing(_) | DatabaseError::InvalidDatabaseUrl => {
                tracing::error!("Storage misconfiguration: {}", err);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::UnknownTable(_) | DatabaseError::QueryError(_) => {
                // Don't expose internal SQL errors to clients
                tracing::error!("Database query error: {}", err);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<TenancyError> for ApiError {
    fn from(err: TenancyError) -> Self {
        match err {
            TenancyError::NoActiveTenant | TenancyError::TenantMismatch { .. } => {
                tracing::error!("Tenant isolation error: {}", err);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            TenancyError::DuplicateDomain(domain) => {
                ApiError::conflict(format!("The domain {} is already taken", domain))
            }
            TenancyError::ContextActivation { tenant_id, source } => {
                tracing::error!("Tenant {} storage unreachable: {}", tenant_id, source);
                ApiError::service_unavailable("Tenant storage is temporarily unavailable")
            }
            TenancyError::TenantNotFound(what) => ApiError::not_found(format!("Tenant not found: {}", what)),
            TenancyError::NotFound { entity, id } => ApiError::not_found(format!("{} {} not found", entity, id)),
            TenancyError::Validation(msg) => ApiError::validation_error(msg, None),
            TenancyError::Database(e) => e.into(),
            TenancyError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            TenancyError::Serialization(e) => {
                tracing::error!("JSON serialization error: {}", e);
                ApiError::internal_server_error("Failed to format response")
            }
        }
    }
}

impl From<ProvisioningError> for ApiError {
    fn from(err: ProvisioningError) -> Self {
        tracing::warn!("{}", err);
        err.source.into()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Expired => ApiError::unauthorized("Token expired"),
            AuthError::InvalidToken(_) => ApiError::unauthorized("Invalid token"),
            AuthError::WrongTenant => ApiError::unauthorized("Token was issued for another tenant"),
            AuthError::InvalidSecret | AuthError::TokenGeneration(_) | AuthError::Crypto(_) => {
                tracing::error!("Authentication failure: {}", err);
                ApiError::internal_server_error("Authentication is not available")
            }
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn tenancy_taxonomy_maps_to_status_codes() {
        assert_eq!(ApiError::from(TenancyError::DuplicateDomain("acme.localhost".into())).status_code(), 409);
        assert_eq!(ApiError::from(TenancyError::NoActiveTenant).status_code(), 500);
        assert_eq!(ApiError::from(TenancyError::TenantNotFound("x".into())).status_code(), 404);
        let activation = TenancyError::ContextActivation {
            tenant_id: Uuid::new_v4(),
            source: DatabaseError::Unavailable("down".into()),
        };
        assert_eq!(ApiError::from(activation).status_code(), 503);

        let validation = ApiError::from(TenancyError::Validation("bad".into()));
        assert_eq!(validation.error_code(), "VALIDATION_ERROR");
        assert_eq!(validation.to_json()["message"], "bad");
    }

    #[test]
    fn provisioning_error_uses_root_cause() {
        let err = ProvisioningError::new("Acme", TenancyError::DuplicateDomain("acme.localhost".into()));
        assert_eq!(ApiError::from(err).status_code(), 409);
    }

    #[test]
    fn unique_violation_is_conflict() {
        let err = DatabaseError::UniqueViolation { table: "users".into(), columns: "tenant_id, email".into() };
        assert_eq!(ApiError::from(err).error_code(), "CONFLICT");
    }
}
