//! Forwards page requests to the rendering origin.
//!
//! Pages themselves are rendered elsewhere; this service sits in front of the
//! renderer so the page cache can hold its output until a revalidation.

use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Uri, header},
    response::Response,
};
use reqwest::{Client, Url};
use tracing::debug;

use crate::application::error::AppError;
use crate::infra::error::InfraError;

use super::HttpState;

// The cache key has no encoding dimension, so upstream must answer uncompressed.
const FORWARD_SKIP: [header::HeaderName; 4] = [
    header::HOST,
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::ACCEPT_ENCODING,
];
const RETURN_SKIP: [header::HeaderName; 2] = [header::CONNECTION, header::TRANSFER_ENCODING];

#[derive(Clone, Debug)]
pub struct UpstreamProxy {
    client: Client,
    origin: Url,
}

impl UpstreamProxy {
    /// `origin` is a scheme and host; request paths replace its path.
    pub fn new(origin: Url, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("vetrina/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, origin })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Origin with the request path and query substituted. The host always
    /// stays the configured one, even for paths like `//other-host/x`.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.origin.clone();
        url.set_path(path);
        url.set_query(query);
        url
    }

    pub async fn fetch(&self, uri: &Uri, headers: &HeaderMap) -> Result<Response, InfraError> {
        let url = self.upstream_url(uri.path(), uri.query());

        let mut forwarded = headers.clone();
        for name in FORWARD_SKIP {
            forwarded.remove(name);
        }

        let upstream = self.client.get(url).headers(forwarded).send().await?;
        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        for name in RETURN_SKIP {
            response_headers.remove(name);
        }
        let body = upstream.bytes().await?;

        debug!(
            target = "vetrina::http::proxy",
            status = status.as_u16(),
            path = uri.path(),
            bytes = body.len(),
            "fetched upstream page"
        );

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

pub(super) async fn proxy_page(
    State(state): State<HttpState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let upstream = state.upstream.as_ref().ok_or(AppError::NotFound)?;
    Ok(upstream.fetch(&uri, &headers).await?)
}
