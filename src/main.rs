use std::{future::IntoFuture, process, sync::Arc};

use axum::http::header::CONTENT_TYPE;
use serde::Serialize;
use tokio::{sync::Notify, task::JoinError};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use vetrina::{
    application::{error::AppError, revalidation::RevalidationService, seo::SiteIdentity},
    cache::{CacheConfig, CacheState},
    config,
    domain::revalidation::{DocumentType, PathSet, RevalidationRequest},
    infra::{
        error::InfraError,
        http::{self, HttpState, REVALIDATE_PATH, UpstreamProxy, WebhookConfig, signature},
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Paths(args) => run_paths(&settings, args),
        config::Command::Notify(args) => run_notify(&settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let cache = settings
        .cache
        .enabled
        .then(|| CacheState::new(CacheConfig::from(&settings.cache)));

    let upstream = settings
        .upstream
        .url
        .clone()
        .map(|url| UpstreamProxy::new(url, settings.upstream.timeout))
        .transpose()?;
    if upstream.is_none() {
        warn!("no upstream renderer configured; page requests will answer 404");
    }

    if settings.webhook.secret.is_none() {
        warn!("webhook.secret is not set; revalidation requests will be refused");
    }

    let revalidation = RevalidationService::new(
        settings.routes.clone(),
        cache.as_ref().map(|state| state.pages.clone()),
    );

    let site = SiteIdentity::from(&settings.site);
    info!(
        site = %site.name,
        public_url = %site.base_url,
        upstream = upstream.as_ref().map(|u| u.origin().as_str()).unwrap_or(""),
        cache_enabled = cache.is_some(),
        "starting vetrina"
    );

    let state = HttpState {
        revalidation: Arc::new(revalidation),
        webhook: WebhookConfig::from(&settings.webhook),
        cache,
        upstream,
    };

    serve_http(&settings, state).await
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    let shutdown = Arc::new(Notify::new());
    let trigger = shutdown.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move { trigger.notified().await });
    let mut handle = tokio::spawn(server.into_future());

    tokio::select! {
        joined = &mut handle => return server_result(joined),
        () = shutdown_signal() => {}
    }

    info!(
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "shutdown requested, draining connections"
    );
    shutdown.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut handle).await {
        Ok(joined) => server_result(joined),
        Err(_) => {
            warn!("graceful shutdown timed out; closing remaining connections");
            handle.abort();
            Ok(())
        }
    }
}

fn server_result(joined: Result<std::io::Result<()>, JoinError>) -> Result<(), AppError> {
    match joined {
        Ok(result) => result.map_err(|err| AppError::from(InfraError::from(err))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

fn document_request(args: &config::DocumentArgs) -> RevalidationRequest {
    RevalidationRequest::new(
        DocumentType::from_tag(args.document_type.trim()),
        args.slug.clone(),
    )
}

#[derive(Serialize)]
struct PathsReport<'a> {
    #[serde(rename = "type")]
    document_type: &'a DocumentType,
    paths: &'a PathSet,
}

fn run_paths(settings: &config::Settings, args: config::PathsArgs) -> Result<(), AppError> {
    let request = document_request(&args.document);
    let paths = settings.routes.paths_to_invalidate(&request);

    if args.json {
        let report = PathsReport {
            document_type: &request.document_type,
            paths: &paths,
        };
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|err| AppError::unexpected(format!("failed to encode paths: {err}")))?;
        println!("{rendered}");
    } else {
        for target in &paths {
            println!("{target}");
        }
    }
    Ok(())
}

async fn run_notify(settings: &config::Settings, args: config::NotifyArgs) -> Result<(), AppError> {
    let secret = settings.webhook.secret.as_deref().ok_or_else(|| {
        InfraError::configuration("webhook.secret is required to sign notifications")
    })?;

    let endpoint = args
        .url
        .clone()
        .unwrap_or_else(|| format!("http://{}{REVALIDATE_PATH}", settings.server.addr));

    let request = document_request(&args.document);
    let body = serde_json::to_vec(&request)
        .map_err(|err| AppError::unexpected(format!("failed to encode webhook body: {err}")))?;
    let timestamp = signature::unix_millis(time::OffsetDateTime::now_utc());
    let header = signature::sign(secret, timestamp, &body);

    let client = reqwest::Client::builder()
        .user_agent(concat!("vetrina/", env!("CARGO_PKG_VERSION")))
        .timeout(settings.upstream.timeout)
        .build()
        .map_err(InfraError::from)?;
    let response = client
        .post(&endpoint)
        .header(CONTENT_TYPE, "application/json")
        .header(signature::SIGNATURE_HEADER, header)
        .body(body)
        .send()
        .await
        .map_err(InfraError::from)?;

    let status = response.status();
    let text = response.text().await.map_err(InfraError::from)?;
    if !status.is_success() {
        return Err(AppError::unexpected(format!(
            "webhook rejected with {status}: {text}"
        )));
    }

    info!(endpoint = %endpoint, document_type = %request.document_type, "revalidation sent");
    println!("{text}");
    Ok(())
}
