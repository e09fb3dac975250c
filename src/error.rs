use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The main error type for tenantry operations
#[derive(Debug, thiserror::Error)]
pub enum TenantryError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Conflict: {0}")]
    Conflict(ConflictReason),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Hard invariants that reject an otherwise authorized admin action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConflictReason {
    #[error("Cannot remove the last admin account")]
    LastAdmin,
    #[error("You cannot deactivate your own account")]
    SelfDeactivation,
    #[error("You cannot delete your own account")]
    SelfDeletion,
}

impl ConflictReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::LastAdmin => "last_admin",
            Self::SelfDeactivation => "self_deactivation",
            Self::SelfDeletion => "self_deletion",
        }
    }
}

/// JSON body for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
    reason: &'static str,
    error_id: String,
}

impl TenantryError {
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn too_many_requests(msg: impl Into<String>) -> Self {
        Self::TooManyRequests(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Uniform error for a tenant-owned resource the caller cannot see.
    ///
    /// Used wherever distinguishing "missing" from "belongs to someone else"
    /// would reveal that another tenant's resource exists.
    pub fn not_found_or_forbidden(resource: &str) -> Self {
        Self::NotFound(format!("{} not found", resource))
    }

    /// Machine-readable reason code included in the response body.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::TooManyRequests(_) => "rate_limited",
            Self::Conflict(reason) => reason.code(),
            Self::Internal(_) | Self::Store(_) | Self::Anyhow(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) | Self::Store(_) | Self::Anyhow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to clients.
    ///
    /// Client errors carry their message. Server errors are replaced with a
    /// generic message; the full error is only logged.
    pub fn safe_message(&self) -> String {
        match self {
            Self::Unauthenticated(msg) => format!("Unauthenticated: {}", msg),
            Self::Forbidden(msg) => format!("Forbidden: {}", msg),
            Self::NotFound(msg) => format!("Not found: {}", msg),
            Self::BadRequest(msg) => format!("Bad request: {}", msg),
            Self::TooManyRequests(msg) => format!("Too many requests: {}", msg),
            Self::Conflict(reason) => reason.to_string(),
            Self::Internal(_) | Self::Anyhow(_) => "Internal server error".to_string(),
            Self::Store(_) => "Storage error".to_string(),
        }
    }
}

impl From<ConflictReason> for TenantryError {
    fn from(reason: ConflictReason) -> Self {
        Self::Conflict(reason)
    }
}

impl IntoResponse for TenantryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                target: "http.error",
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request failed"
            );
        } else {
            tracing::debug!(
                target: "http.error",
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: self.safe_message(),
            reason: self.reason(),
            error_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for tenantry operations
pub type Result<T> = std::result::Result<T, TenantryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            TenantryError::unauthenticated("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(TenantryError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(TenantryError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            TenantryError::too_many_requests("x").status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            TenantryError::from(ConflictReason::LastAdmin).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            TenantryError::store("connection reset").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err = TenantryError::internal("db password is hunter2");
        assert_eq!(err.safe_message(), "Internal server error");

        let err = TenantryError::from(anyhow::anyhow!("pool exhausted"));
        assert_eq!(err.safe_message(), "Internal server error");
        assert_eq!(err.reason(), "internal");
    }

    #[test]
    fn test_client_errors_keep_message() {
        let err = TenantryError::forbidden("Admin access required");
        assert_eq!(err.safe_message(), "Forbidden: Admin access required");
        assert_eq!(err.reason(), "forbidden");
    }

    #[test]
    fn test_conflict_reason_codes() {
        let err = TenantryError::from(ConflictReason::SelfDeletion);
        assert_eq!(err.reason(), "self_deletion");
        assert_eq!(err.safe_message(), "You cannot delete your own account");
    }

    #[test]
    fn test_not_found_or_forbidden_is_not_found() {
        let err = TenantryError::not_found_or_forbidden("Tenant");
        assert!(matches!(err, TenantryError::NotFound(_)));
        assert_eq!(err.to_string(), "Not found: Tenant not found");
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let response = TenantryError::forbidden("nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "Forbidden: nope");
        assert_eq!(json["reason"], "forbidden");
        assert!(json["error_id"].is_string());
    }
}
