//! `POST /api/revalidate`: the CMS publish hook.

use axum::{Json, extract::State, http::HeaderMap};
use bytes::Bytes;
use metrics::counter;
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tracing::warn;

use crate::application::revalidation::RevalidationOutcome;
use crate::domain::revalidation::RevalidationRequest;

use super::HttpState;
use super::error::WebhookError;
use super::signature::{SIGNATURE_HEADER, unix_millis, verify};

pub(crate) const METRIC_WEBHOOK_REJECTED: &str = "vetrina_webhook_rejected_total";

/// Signature verification settings.
#[derive(Clone, Default)]
pub struct WebhookConfig {
    /// Shared secret; requests are refused with 500 until one is configured.
    pub secret: Option<String>,
    pub max_skew: Option<Duration>,
}

impl From<&crate::config::WebhookSettings> for WebhookConfig {
    fn from(settings: &crate::config::WebhookSettings) -> Self {
        Self {
            secret: settings.secret.clone(),
            max_skew: settings.max_skew,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub revalidated: bool,
    /// Server time in Unix milliseconds.
    pub now: i64,
    #[serde(flatten)]
    pub outcome: RevalidationOutcome,
}

pub(super) async fn revalidate(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookError> {
    handle(&state, &headers, &body).map_err(|err| {
        counter!(METRIC_WEBHOOK_REJECTED, "reason" => rejection_reason(&err)).increment(1);
        err
    })
}

fn handle(state: &HttpState, headers: &HeaderMap, body: &[u8]) -> Result<Json<WebhookResponse>, WebhookError> {
    let Some(secret) = state.webhook.secret.as_deref() else {
        warn!(target = "vetrina::revalidate", "webhook received but no secret is configured");
        return Err(WebhookError::SecretMissing);
    };

    let now = OffsetDateTime::now_utc();
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    verify(signature, body, secret, state.webhook.max_skew, now)?;

    let request: RevalidationRequest =
        serde_json::from_slice(body).map_err(|err| WebhookError::InvalidBody(err.to_string()))?;

    let outcome = state.revalidation.revalidate(&request);
    Ok(Json(WebhookResponse {
        revalidated: true,
        now: unix_millis(now),
        outcome,
    }))
}

fn rejection_reason(err: &WebhookError) -> &'static str {
    match err {
        WebhookError::SecretMissing => "not_configured",
        WebhookError::Signature(_) => "signature",
        WebhookError::InvalidBody(_) => "body",
    }
}
