//! Page cache middleware.
//!
//! Caches successful GET responses per (language, path, query) and serves
//! them until a revalidation drops the path. Draft/preview requests bypass
//! the cache entirely since their content differs from the published site.

use std::sync::Arc;

use axum::{
    Error as BodyError,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, future, stream};
use tracing::{debug, instrument};

use crate::domain::language::Language;

use super::{
    CacheConfig,
    keys::PageKey,
    store::{CachedResponse, PageStore},
};

const LANGUAGE_QUERY_PARAM: &str = "lang";
const PREVIEW_QUERY_PARAM: &str = "preview";

/// Shared cache state for middleware and the revalidation service.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub pages: Arc<PageStore>,
}

impl CacheState {
    pub fn new(config: CacheConfig) -> Self {
        let pages = Arc::new(PageStore::new(&config));
        Self { config, pages }
    }
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enabled || request.method() != Method::GET {
        return next.run(request).await;
    }

    let query = request.uri().query().unwrap_or("");
    if is_preview(query, request.headers(), &cache.config.preview_cookie) {
        debug!(cache = "page", outcome = "bypass", "preview request");
        return next.run(request).await;
    }

    let language = request_language(query, request.headers());
    let key = PageKey::new(language, request.uri().path(), query);

    if let Some(cached) = cache.pages.get(&key) {
        debug!(cache = "page", outcome = "hit", %language, "serving cached page");
        return build_response(cached);
    }

    debug!(cache = "page", outcome = "miss", %language, "rendering page");

    let generation = cache.pages.generation();
    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }
    if !is_cacheable(response.headers()) {
        debug!(cache = "page", outcome = "skip", "response not cacheable");
        return response;
    }

    let limit = cache.config.body_limit_bytes;
    let declared = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared.is_some_and(|length| length > limit) {
        debug!(cache = "page", outcome = "skip", "body over cache limit");
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match buffer_within(body, limit).await {
        Ok(Buffered::Complete(bytes)) => bytes,
        Ok(Buffered::Oversized(body)) => {
            debug!(cache = "page", outcome = "skip", "body over cache limit");
            return Response::from_parts(parts, body);
        }
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter(|(name, _)| *name != header::SET_COOKIE)
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect(),
        body: bytes.clone(),
    };
    if !cache.pages.set_if_current(key, cached, generation) {
        debug!(cache = "page", outcome = "skip", "invalidated while rendering");
    }

    Response::from_parts(parts, Body::from(bytes))
}

enum Buffered {
    Complete(Bytes),
    /// Limit exceeded; the body is rebuilt from what was read plus the rest.
    Oversized(Body),
}

async fn buffer_within(body: Body, limit: usize) -> Result<Buffered, BodyError> {
    let mut chunks = body.into_data_stream();
    let mut buffered = BytesMut::new();
    while let Some(chunk) = chunks.next().await {
        buffered.extend_from_slice(&chunk?);
        if buffered.len() > limit {
            let head = stream::once(future::ready(Ok::<_, BodyError>(buffered.freeze())));
            return Ok(Buffered::Oversized(Body::from_stream(head.chain(chunks))));
        }
    }
    Ok(Buffered::Complete(buffered.freeze()))
}

/// Responses the key cannot tell apart, or that upstream marks private, are
/// never stored. The key carries the language, so `Vary: Accept-Language`
/// is the only vary allowed.
fn is_cacheable(headers: &HeaderMap) -> bool {
    let restricted = headers
        .get_all(header::CACHE_CONTROL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|directive| directive.split('=').next())
        .map(str::trim)
        .any(|directive| {
            directive.eq_ignore_ascii_case("no-store") || directive.eq_ignore_ascii_case("private")
        });
    if restricted {
        return false;
    }

    let encoded = headers
        .get(header::CONTENT_ENCODING)
        .is_some_and(|value| value.as_bytes() != b"identity");
    if encoded {
        return false;
    }

    headers.get_all(header::VARY).iter().all(|value| {
        value.to_str().is_ok_and(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .all(|name| name.eq_ignore_ascii_case("accept-language"))
        })
    })
}

/// Language for a page request: `?lang=` first, then `Accept-Language`.
pub fn request_language(query: &str, headers: &HeaderMap) -> Language {
    let from_query = url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == LANGUAGE_QUERY_PARAM)
        .and_then(|(_, value)| Language::parse(&value));
    if let Some(language) = from_query {
        return language;
    }

    headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok())
        .map(Language::from_accept_language)
        .unwrap_or_default()
}

fn is_preview(query: &str, headers: &HeaderMap, preview_cookie: &str) -> bool {
    if url::form_urlencoded::parse(query.as_bytes()).any(|(name, _)| name == PREVIEW_QUERY_PARAM) {
        return true;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .any(|(name, _)| name == preview_cookie)
}

fn build_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).expect("header value"));
        }
        map
    }

    #[test]
    fn query_language_overrides_header() {
        let headers = headers(&[(header::ACCEPT_LANGUAGE, "es-ES")]);
        assert_eq!(request_language("lang=en&page=2", &headers), Language::En);
        assert_eq!(request_language("page=2", &headers), Language::Es);
    }

    #[test]
    fn unknown_query_language_falls_through() {
        let headers = headers(&[(header::ACCEPT_LANGUAGE, "en")]);
        assert_eq!(request_language("lang=fr", &headers), Language::En);
        assert_eq!(request_language("", &HeaderMap::new()), Language::It);
    }

    #[test]
    fn preview_cookie_detection() {
        let with_cookie = headers(&[(header::COOKIE, "theme=dark; vetrina-preview=1")]);
        assert!(is_preview("", &with_cookie, "vetrina-preview"));

        let other = headers(&[(header::COOKIE, "vetrina-preview-seen=1")]);
        assert!(!is_preview("", &other, "vetrina-preview"));
        assert!(!is_preview("", &HeaderMap::new(), "vetrina-preview"));
    }

    #[test]
    fn private_and_no_store_responses_are_not_cacheable() {
        assert!(is_cacheable(&HeaderMap::new()));
        assert!(is_cacheable(&headers(&[(header::CACHE_CONTROL, "public, max-age=60")])));
        assert!(!is_cacheable(&headers(&[(header::CACHE_CONTROL, "no-store")])));
        assert!(!is_cacheable(&headers(&[(header::CACHE_CONTROL, "max-age=0, Private")])));
        assert!(!is_cacheable(&headers(&[(header::CACHE_CONTROL, "private=\"set-cookie\"")])));
    }

    #[test]
    fn only_language_vary_is_cacheable() {
        assert!(is_cacheable(&headers(&[(header::VARY, "Accept-Language")])));
        assert!(!is_cacheable(&headers(&[(header::VARY, "Accept-Language, Cookie")])));
        assert!(!is_cacheable(&headers(&[(header::VARY, "*")])));
        assert!(!is_cacheable(&headers(&[(header::VARY, "accept-encoding")])));
    }

    #[test]
    fn encoded_bodies_are_not_cacheable() {
        assert!(!is_cacheable(&headers(&[(header::CONTENT_ENCODING, "gzip")])));
        assert!(is_cacheable(&headers(&[(header::CONTENT_ENCODING, "identity")])));
    }

    #[tokio::test]
    async fn bounded_buffering_keeps_oversized_bodies_whole() {
        let body = Body::from_stream(stream::iter([
            Ok::<_, BodyError>(Bytes::from_static(b"0123")),
            Ok(Bytes::from_static(b"4567")),
            Ok(Bytes::from_static(b"89")),
        ]));
        let Ok(Buffered::Oversized(body)) = buffer_within(body, 5).await else {
            panic!("body should exceed the limit");
        };
        let rest = axum::body::to_bytes(body, usize::MAX).await.expect("body");
        assert_eq!(rest, Bytes::from_static(b"0123456789"));

        let Ok(Buffered::Complete(bytes)) = buffer_within(Body::from("short"), 5).await else {
            panic!("body should fit");
        };
        assert_eq!(bytes, Bytes::from_static(b"short"));
    }

    #[test]
    fn preview_query_detection() {
        assert!(is_preview("preview=true", &HeaderMap::new(), "vetrina-preview"));
        assert!(is_preview("lang=en&preview", &HeaderMap::new(), "vetrina-preview"));
        assert!(!is_preview("previewed=1", &HeaderMap::new(), "vetrina-preview"));
    }
}
