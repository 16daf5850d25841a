use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::identity::exchange::ExchangeError;
use crate::identity::validator::AuthError;
use crate::query::executor::ExecutionError;

/// Terminal failures of a chat request.
///
/// Query generation failures are not here: they end in a normal reply.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),

    #[error("downstream authorization failed: {0}")]
    DownstreamAuthorization(#[from] ExchangeError),

    #[error("query execution failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Pipeline stage the error came from, for logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            AppError::Authentication(_) => "validate",
            AppError::DownstreamAuthorization(_) => "exchange",
            AppError::Execution(_) => "execute",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::Authentication(AuthError::MissingToken) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "missing_credentials",
                "missing bearer token".to_string(),
            ),
            AppError::Authentication(AuthError::UnknownSigningKey { .. }) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "unknown_signing_key",
                "unknown signing key".to_string(),
            ),
            AppError::Authentication(AuthError::InvalidCredentials { reason }) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "invalid_credentials",
                format!("invalid credentials: {}", reason),
            ),
            AppError::DownstreamAuthorization(e) => {
                tracing::error!("On-behalf-of exchange failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "downstream_authorization_failed",
                    "downstream authorization failed".to_string(),
                )
            }
            AppError::Execution(e) => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                "query_execution_failed",
                e.to_string(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let mut error = json!({
            "message": msg,
            "type": error_type,
            "code": code,
        });

        if let AppError::Execution(ExecutionError::Status { status, body }) = &self {
            error["downstream_status"] = json!(status);
            error["downstream_body"] = json!(body);
        }

        let mut response = (status, Json(json!({ "error": error }))).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_errors_are_401() {
        let resp = AppError::from(AuthError::UnknownSigningKey { kid: "k".into() }).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let resp = AppError::from(AuthError::MissingToken).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_exchange_failure_is_server_error() {
        let err = AppError::from(ExchangeError::MalformedResponse {
            status: 502,
            detail: "html".into(),
        });
        assert_eq!(err.stage(), "exchange");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_execution_failure_is_bad_gateway() {
        let err = AppError::from(ExecutionError::Status {
            status: 400,
            body: "bad fetchxml".into(),
        });
        assert_eq!(err.stage(), "execute");
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
