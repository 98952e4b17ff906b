use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;

use super::signature::SignatureError;

pub mod codes {
    pub const NOT_CONFIGURED: &str = "webhook_not_configured";
    pub const MISSING_SIGNATURE: &str = "missing_signature";
    pub const INVALID_SIGNATURE: &str = "invalid_signature";
    pub const EXPIRED_SIGNATURE: &str = "expired_signature";
    pub const INVALID_BODY: &str = "invalid_body";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Failures of the revalidation webhook, rendered as JSON API errors.
#[derive(Debug)]
pub enum WebhookError {
    SecretMissing,
    Signature(SignatureError),
    InvalidBody(String),
}

impl WebhookError {
    fn status(&self) -> StatusCode {
        match self {
            Self::SecretMissing => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Signature(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::SecretMissing => codes::NOT_CONFIGURED,
            Self::Signature(SignatureError::Missing) => codes::MISSING_SIGNATURE,
            Self::Signature(SignatureError::Expired) => codes::EXPIRED_SIGNATURE,
            Self::Signature(SignatureError::Malformed | SignatureError::Mismatch) => {
                codes::INVALID_SIGNATURE
            }
            Self::InvalidBody(_) => codes::INVALID_BODY,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::SecretMissing => "Webhook secret is not configured",
            Self::Signature(_) => "Invalid signature",
            Self::InvalidBody(_) => "Bad request",
        }
    }

    /// Client-facing detail; configuration problems stay in the logs.
    fn hint(&self) -> Option<String> {
        match self {
            Self::SecretMissing => None,
            Self::Signature(err) => Some(err.to_string()),
            Self::InvalidBody(detail) => Some(detail.clone()),
        }
    }
}

impl From<SignatureError> for WebhookError {
    fn from(err: SignatureError) -> Self {
        Self::Signature(err)
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let hint = self.hint();
        let detail = format!("{code}: {}", hint.as_deref().unwrap_or(self.message()));
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: code.to_string(),
                message: self.message().to_string(),
                hint,
            },
        };
        let mut response = (status, Json(body)).into_response();
        ErrorReport::from_message("infra::http::webhook", status, detail).attach(&mut response);
        response
    }
}
