mod error;
mod middleware;
mod proxy;
pub mod signature;
mod webhook;

pub use error::{ApiErrorBody, ApiErrorMessage, WebhookError, codes};
pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use proxy::UpstreamProxy;
pub use webhook::{WebhookConfig, WebhookResponse};

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::{
    application::revalidation::RevalidationService,
    cache::{CacheState, page_cache_layer},
};

use self::middleware::{log_responses, set_request_context};

pub const REVALIDATE_PATH: &str = "/api/revalidate";
pub const HEALTH_PATH: &str = "/healthz";

#[derive(Clone)]
pub struct HttpState {
    pub revalidation: Arc<RevalidationService>,
    pub webhook: WebhookConfig,
    pub cache: Option<CacheState>,
    /// Rendering origin; without one, page requests answer 404.
    pub upstream: Option<UpstreamProxy>,
}

pub fn build_router(state: HttpState) -> Router {
    let pages = Router::new()
        .route("/", get(proxy::proxy_page))
        .route("/{*path}", get(proxy::proxy_page));

    let pages = if let Some(cache_state) = state.cache.clone() {
        pages.layer(axum_middleware::from_fn_with_state(
            cache_state,
            page_cache_layer,
        ))
    } else {
        pages
    };

    let service_routes = Router::new()
        .route(REVALIDATE_PATH, post(webhook::revalidate))
        .route(HEALTH_PATH, get(health));

    service_routes
        .merge(pages)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
