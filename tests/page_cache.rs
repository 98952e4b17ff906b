use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, Uri, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tower::ServiceExt;
use url::Url;
use vetrina::application::revalidation::RevalidationService;
use vetrina::cache::{CacheConfig, CacheState, PageStore, page_cache_layer};
use vetrina::domain::revalidation::{DocumentType, RevalidationRequest, SiteRoutes};
use vetrina::infra::http::signature::{self, SIGNATURE_HEADER};
use vetrina::infra::http::{HttpState, UpstreamProxy, WebhookConfig, build_router};

const SECRET: &str = "page-cache-secret";

/// Renderer stand-in that counts how often each page is produced.
///
/// A few paths answer with special headers: `/missing` is a 404, `/account`
/// is `Cache-Control: private`, `/by-cookie` varies on `Cookie`, and
/// `/encoding` echoes the `Accept-Encoding` it received.
async fn spawn_renderer(renders: Arc<AtomicUsize>) -> SocketAddr {
    let app = Router::new().fallback(move |uri: Uri, headers: HeaderMap| {
        let renders = renders.clone();
        async move {
            let count = renders.fetch_add(1, Ordering::SeqCst) + 1;
            let html = format!("<h1>{}</h1><p>render {count}</p>", uri.path());
            match uri.path() {
                "/missing" => (StatusCode::NOT_FOUND, "gone").into_response(),
                "/account" => ([(header::CACHE_CONTROL, "private, max-age=0")], html).into_response(),
                "/by-cookie" => ([(header::VARY, "Cookie")], html).into_response(),
                "/encoding" => headers
                    .get(header::ACCEPT_ENCODING)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("none")
                    .to_string()
                    .into_response(),
                _ => (
                    [
                        (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                        (header::SET_COOKIE, "session=abc"),
                    ],
                    html,
                )
                    .into_response(),
            }
        }
    });
    serve(app).await
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("renderer should bind");
    let addr = listener.local_addr().expect("renderer address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("renderer should serve");
    });
    addr
}

struct Harness {
    app: Router,
    pages: Arc<PageStore>,
    renders: Arc<AtomicUsize>,
}

async fn harness() -> Harness {
    let renders = Arc::new(AtomicUsize::new(0));
    let addr = spawn_renderer(renders.clone()).await;
    let origin = Url::parse(&format!("http://{addr}/")).expect("origin url");

    let cache = CacheState::new(CacheConfig::default());
    let pages = cache.pages.clone();
    let state = HttpState {
        revalidation: Arc::new(RevalidationService::new(
            SiteRoutes::default(),
            Some(pages.clone()),
        )),
        webhook: WebhookConfig {
            secret: Some(SECRET.to_string()),
            max_skew: None,
        },
        cache: Some(cache),
        upstream: Some(
            UpstreamProxy::new(origin, Duration::from_secs(5)).expect("proxy should build"),
        ),
    };

    Harness {
        app: build_router(state),
        pages,
        renders,
    }
}

impl Harness {
    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        self.get_with(uri, cookie.map(|cookie| (header::COOKIE, cookie)))
            .await
    }

    async fn get_with(&self, uri: &str, extra: Option<(header::HeaderName, &str)>) -> Response {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some((name, value)) = extra {
            builder = builder.header(name, value);
        }
        let request = builder.body(Body::empty()).expect("request should build");
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }

    async fn publish(&self, body: &str) -> StatusCode {
        let timestamp = signature::unix_millis(OffsetDateTime::now_utc());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/revalidate")
            .header(header::CONTENT_TYPE, "application/json")
            .header(
                SIGNATURE_HEADER,
                signature::sign(SECRET, timestamp, body.as_bytes()),
            )
            .body(Body::from(body.to_string()))
            .expect("request should build");
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
            .status()
    }

    fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

async fn text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

#[tokio::test]
async fn published_product_refreshes_cached_detail_page() {
    let harness = harness().await;

    let first = harness.get("/prodotti/policut-20", None).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert!(text(first).await.contains("render 1"));

    let second = harness.get("/prodotti/policut-20", None).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert!(second.headers().get(header::SET_COOKIE).is_none());
    assert!(text(second).await.contains("render 1"));
    assert_eq!(harness.renders(), 1);

    let status = harness
        .publish(r#"{"_type":"product","slug":{"current":"policut-20"}}"#)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(harness.pages.is_empty());

    let third = harness.get("/prodotti/policut-20", None).await;
    assert!(text(third).await.contains("render 2"));
    assert_eq!(harness.renders(), 2);
}

#[tokio::test]
async fn unrelated_documents_leave_pages_cached() {
    let harness = harness().await;

    harness.get("/faq", None).await;
    harness.get("/rivenditori", None).await;
    assert_eq!(harness.pages.len(), 2);

    assert_eq!(harness.publish(r#"{"_type":"dealer"}"#).await, StatusCode::OK);
    assert_eq!(harness.pages.len(), 1);

    harness.get("/faq", None).await;
    assert_eq!(harness.renders(), 2);
}

#[tokio::test]
async fn languages_and_queries_are_cached_separately() {
    let harness = harness().await;

    harness.get("/prodotti", None).await;
    harness.get("/prodotti?lang=en", None).await;
    harness.get("/prodotti?lang=en", None).await;
    harness.get("/prodotti?page=2", None).await;
    assert_eq!(harness.renders(), 3);
    assert_eq!(harness.pages.len(), 3);

    assert_eq!(
        harness
            .publish(r#"{"_type":"productCategory"}"#)
            .await,
        StatusCode::OK
    );
    assert!(harness.pages.is_empty());
}

#[tokio::test]
async fn preview_requests_bypass_the_cache() {
    let harness = harness().await;

    harness.get("/chi-siamo", Some("vetrina-preview=1")).await;
    harness.get("/chi-siamo", Some("theme=dark; vetrina-preview=1")).await;
    harness.get("/chi-siamo?preview=true", None).await;
    assert_eq!(harness.renders(), 3);
    assert!(harness.pages.is_empty());
}

#[tokio::test]
async fn upstream_errors_are_passed_through_uncached() {
    let harness = harness().await;

    let response = harness.get("/missing", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    harness.get("/missing", None).await;
    assert_eq!(harness.renders(), 2);
    assert!(harness.pages.is_empty());
}

#[tokio::test]
async fn unreachable_upstream_is_a_bad_gateway() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("probe should bind");
    let addr = listener.local_addr().expect("probe address");
    drop(listener);

    let origin = Url::parse(&format!("http://{addr}/")).expect("origin url");
    let state = HttpState {
        revalidation: Arc::new(RevalidationService::new(SiteRoutes::default(), None)),
        webhook: WebhookConfig::default(),
        cache: None,
        upstream: Some(
            UpstreamProxy::new(origin, Duration::from_secs(2)).expect("proxy should build"),
        ),
    };

    let request = Request::builder()
        .uri("/")
        .body(Body::empty())
        .expect("request should build");
    let response = build_router(state)
        .oneshot(request)
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn scheme_relative_paths_stay_on_the_renderer() {
    let harness = harness().await;

    let other_hits = Arc::new(AtomicUsize::new(0));
    let counter = other_hits.clone();
    let other = serve(Router::new().fallback(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            "other host"
        }
    }))
    .await;

    let response = harness.get(&format!("//{other}/secret"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = text(response).await;
    assert!(!body.contains("other host"), "{body}");
    assert!(body.contains(&format!("//{other}/secret")), "{body}");
    assert_eq!(other_hits.load(Ordering::SeqCst), 0);
    assert_eq!(harness.renders(), 1);
}

#[tokio::test]
async fn client_encoding_is_not_forwarded() {
    let harness = harness().await;

    let response = harness
        .get_with("/encoding", Some((header::ACCEPT_ENCODING, "gzip, br")))
        .await;
    assert_eq!(text(response).await, "none");

    let response = harness.get("/encoding", None).await;
    assert_eq!(text(response).await, "none");
    assert_eq!(harness.renders(), 1);
}

#[tokio::test]
async fn private_and_varying_responses_are_not_cached() {
    let harness = harness().await;

    harness.get("/account", None).await;
    harness.get("/account", None).await;
    harness.get("/by-cookie", Some("theme=dark")).await;
    harness.get("/by-cookie", Some("theme=light")).await;
    assert_eq!(harness.renders(), 4);
    assert!(harness.pages.is_empty());
}

#[tokio::test]
async fn accented_slugs_are_revalidated() {
    let harness = harness().await;

    harness.get("/prodotti/caff%C3%A8", None).await;
    harness.get("/prodotti/caff%C3%A8", None).await;
    assert_eq!(harness.renders(), 1);

    assert_eq!(
        harness
            .publish(r#"{"_type":"product","slug":{"current":"caffè"}}"#)
            .await,
        StatusCode::OK
    );
    assert!(harness.pages.is_empty());

    harness.get("/prodotti/caff%C3%A8", None).await;
    assert_eq!(harness.renders(), 2);
}

#[tokio::test]
async fn publish_during_render_does_not_cache_the_old_page() {
    let cache = CacheState::new(CacheConfig::default());
    let service = Arc::new(RevalidationService::new(
        SiteRoutes::default(),
        Some(cache.pages.clone()),
    ));
    let version = Arc::new(AtomicUsize::new(1));

    let renderer_service = service.clone();
    let renderer_version = version.clone();
    let app = Router::new()
        .route(
            "/faq",
            get(move || {
                let service = renderer_service.clone();
                let version = renderer_version.clone();
                async move {
                    let rendered = version.load(Ordering::SeqCst);
                    if rendered == 1 {
                        // The CMS publishes v2 while v1 is still being rendered.
                        version.store(2, Ordering::SeqCst);
                        service.revalidate(&RevalidationRequest::new(DocumentType::Faq, None));
                    }
                    format!("v{rendered}")
                }
            }),
        )
        .layer(middleware::from_fn_with_state(
            cache.clone(),
            page_cache_layer,
        ));

    let mut bodies = Vec::new();
    for _ in 0..3 {
        let request = Request::builder()
            .uri("/faq")
            .body(Body::empty())
            .expect("request should build");
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        bodies.push(text(response).await);
    }

    assert_eq!(bodies, ["v1", "v2", "v2"]);
    assert_eq!(cache.pages.len(), 1);
}

#[tokio::test]
async fn oversized_pages_are_served_but_not_cached() {
    let cache = CacheState::new(CacheConfig {
        body_limit_bytes: 16,
        ..Default::default()
    });
    let renders = Arc::new(AtomicUsize::new(0));
    let counter = renders.clone();
    let app = Router::new()
        .route(
            "/{*path}",
            get(move |uri: Uri| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if uri.path() == "/big" {
                        Body::from_stream(futures::stream::iter([
                            Ok::<_, std::io::Error>("x".repeat(10)),
                            Ok("y".repeat(10)),
                        ]))
                    } else {
                        Body::from("small")
                    }
                }
            }),
        )
        .layer(middleware::from_fn_with_state(
            cache.clone(),
            page_cache_layer,
        ));

    for _ in 0..2 {
        let request = Request::builder()
            .uri("/big")
            .body(Body::empty())
            .expect("request should build");
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        assert_eq!(text(response).await, format!("{}{}", "x".repeat(10), "y".repeat(10)));
    }
    assert_eq!(renders.load(Ordering::SeqCst), 2);
    assert!(cache.pages.is_empty());

    let request = Request::builder()
        .uri("/small")
        .body(Body::empty())
        .expect("request should build");
    app.clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    assert_eq!(cache.pages.len(), 1);
}
