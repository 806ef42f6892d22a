//! Gateway error taxonomy and its HTTP rendering.
//!
//! Every failure ends the request immediately. The caller gets the uniform
//! `{success: false, error}` envelope with a short message; operator detail
//! only goes to the log.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::credential::CredentialError;
use crate::validation::ValidationError;
use crate::voice::UpstreamError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Too many requests. Please try again later.")]
    RateLimited { retry_after_secs: u64 },
    #[error("Invalid request body")]
    InvalidBody,
    #[error("{0}")]
    AuthFormatInvalid(ValidationError),
    #[error("Invalid password")]
    AuthMismatch,
    #[error("Server configuration error")]
    ConfigMissing(&'static str),
    #[error("{0}")]
    PhoneInvalid(ValidationError),
    #[error("{0}")]
    BusinessNameInvalid(ValidationError),
    #[error("{message}")]
    UpstreamClientError { status: StatusCode, message: String },
    #[error("{message}")]
    UpstreamServerError { message: String, detail: String },
    #[error("Failed to place call. Please try again.")]
    UpstreamUnreachable(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::InvalidBody
            | GatewayError::PhoneInvalid(_)
            | GatewayError::BusinessNameInvalid(_) => StatusCode::BAD_REQUEST,
            GatewayError::AuthFormatInvalid(_) | GatewayError::AuthMismatch => StatusCode::UNAUTHORIZED,
            GatewayError::UpstreamClientError { status, .. } => *status,
            GatewayError::ConfigMissing(_)
            | GatewayError::UpstreamServerError { .. }
            | GatewayError::UpstreamUnreachable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn log(&self) {
        match self {
            GatewayError::ConfigMissing(setting) => {
                error!(setting = %setting, "Required setting is not configured")
            }
            GatewayError::UpstreamServerError { detail, .. } => {
                error!(detail = %detail, "Voice provider call failed")
            }
            GatewayError::UpstreamUnreachable(detail) => {
                error!(detail = %detail, "Voice provider unreachable")
            }
            other => warn!(status = %other.status(), error = %other, "Request rejected"),
        }
    }
}

impl From<ValidationError> for GatewayError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::CredentialMissing | ValidationError::CredentialMalformed => {
                GatewayError::AuthFormatInvalid(err)
            }
            ValidationError::PhoneInvalid => GatewayError::PhoneInvalid(err),
            ValidationError::BusinessNameInvalid => GatewayError::BusinessNameInvalid(err),
        }
    }
}

impl From<CredentialError> for GatewayError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Mismatch => GatewayError::AuthMismatch,
            CredentialError::NotConfigured => GatewayError::ConfigMissing("auth.password_hash"),
        }
    }
}

/// Maps adapter failures without echoing provider bodies, except 400 detail.
impl From<UpstreamError> for GatewayError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::NotConfigured(setting) => GatewayError::ConfigMissing(setting),
            UpstreamError::InvalidProviderCredentials => GatewayError::UpstreamServerError {
                message: "Voice provider authentication failed. Check server configuration.".into(),
                detail: err.to_string(),
            },
            UpstreamError::InsufficientBalance => GatewayError::UpstreamClientError {
                status: StatusCode::PAYMENT_REQUIRED,
                message: "Insufficient account balance on the voice provider".into(),
            },
            UpstreamError::RateLimited => GatewayError::UpstreamClientError {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: "Voice provider rate limit exceeded. Please try again shortly.".into(),
            },
            UpstreamError::Rejected(detail) => GatewayError::UpstreamClientError {
                status: StatusCode::BAD_REQUEST,
                message: detail,
            },
            UpstreamError::Status(code) => GatewayError::UpstreamServerError {
                message: format!("Upstream error {}", code),
                detail: err.to_string(),
            },
            UpstreamError::MalformedResponse(_) => GatewayError::UpstreamServerError {
                message: "Failed to initiate call".into(),
                detail: err.to_string(),
            },
            UpstreamError::Transport(e) => GatewayError::UpstreamUnreachable(e.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status();
        let body = match &self {
            GatewayError::RateLimited { retry_after_secs } => json!({
                "success": false,
                "error": self.to_string(),
                "retryAfter": retry_after_secs,
            }),
            _ => json!({
                "success": false,
                "error": self.to_string(),
            }),
        };

        let mut response = (status, Json(body)).into_response();
        if let GatewayError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            GatewayError::from(ValidationError::CredentialMalformed).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::from(ValidationError::PhoneInvalid).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::from(CredentialError::NotConfigured).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_mapping() {
        let err = GatewayError::from(UpstreamError::InsufficientBalance);
        assert_eq!(err.status(), StatusCode::PAYMENT_REQUIRED);
        assert!(err.to_string().contains("balance"));

        let err = GatewayError::from(UpstreamError::InvalidProviderCredentials);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = GatewayError::from(UpstreamError::Rejected("bad number".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "bad number");

        let err = GatewayError::from(UpstreamError::Status(503));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Upstream error 503");

        let err = GatewayError::from(UpstreamError::NotConfigured("voice.agent_id"));
        assert!(matches!(err, GatewayError::ConfigMissing("voice.agent_id")));
        assert_eq!(err.to_string(), "Server configuration error");
    }

    #[tokio::test]
    async fn test_rate_limited_response() {
        let response = GatewayError::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["retryAfter"], 42);
    }
}
