//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, DocumentArgs, NotifyArgs, PathsArgs, ServeArgs, ServeOverrides};

use std::{net::SocketAddr, num::NonZeroUsize, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::revalidation::{
    DEFAULT_CATEGORIES_PATH, DEFAULT_DEALERS_PATH, DEFAULT_FAQ_PATH, DEFAULT_PRODUCTS_PATH,
    SiteRoutes,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "vetrina";
const ENV_PREFIX: &str = "VETRINA";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_WEBHOOK_MAX_SKEW_SECS: u64 = 300;
const DEFAULT_CACHE_PAGE_LIMIT: usize = 500;
const DEFAULT_CACHE_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SITE_NAME: &str = "Vetrina";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000/";

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub webhook: WebhookSettings,
    pub cache: CacheSettings,
    pub routes: SiteRoutes,
    pub site: SiteSettings,
    pub upstream: UpstreamSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Clone)]
pub struct WebhookSettings {
    pub secret: Option<String>,
    /// `None` disables the timestamp window.
    pub max_skew: Option<time::Duration>,
}

impl std::fmt::Debug for WebhookSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSettings")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("max_skew", &self.max_skew)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub page_limit: NonZeroUsize,
    pub body_limit_bytes: NonZeroUsize,
    pub preview_cookie: String,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub name: String,
    pub public_url: Url,
}

#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub url: Option<Url>,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Paths(_)) | Some(Command::Notify(_)) | None => {}
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    webhook: RawWebhookSettings,
    cache: RawCacheSettings,
    routes: RawRoutesSettings,
    site: RawSiteSettings,
    upstream: RawUpstreamSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(seconds) = overrides.webhook_max_skew_seconds {
            self.webhook.max_skew_seconds = Some(seconds);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(limit) = overrides.cache_page_limit {
            self.cache.page_limit = Some(limit);
        }
        if let Some(url) = overrides.upstream_url.as_ref() {
            self.upstream.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            webhook,
            cache,
            routes,
            site,
            upstream,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            webhook: build_webhook_settings(webhook)?,
            cache: build_cache_settings(cache)?,
            routes: build_routes(routes)?,
            site: build_site_settings(site)?,
            upstream: build_upstream_settings(upstream)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_webhook_settings(webhook: RawWebhookSettings) -> Result<WebhookSettings, LoadError> {
    let secret = webhook.secret.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let skew_secs = webhook
        .max_skew_seconds
        .unwrap_or(DEFAULT_WEBHOOK_MAX_SKEW_SECS);
    let skew_secs = i64::try_from(skew_secs).map_err(|_| {
        LoadError::invalid(
            "webhook.max_skew_seconds",
            "value exceeds supported range for i64",
        )
    })?;
    let max_skew = (skew_secs > 0).then(|| time::Duration::seconds(skew_secs));

    Ok(WebhookSettings { secret, max_skew })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let page_limit = cache.page_limit.unwrap_or(DEFAULT_CACHE_PAGE_LIMIT);
    let page_limit = NonZeroUsize::new(page_limit)
        .ok_or_else(|| LoadError::invalid("cache.page_limit", "must be greater than zero"))?;

    let body_limit = cache
        .body_limit_bytes
        .unwrap_or(DEFAULT_CACHE_BODY_LIMIT_BYTES);
    let body_limit_bytes = NonZeroUsize::new(body_limit).ok_or_else(|| {
        LoadError::invalid("cache.body_limit_bytes", "must be greater than zero")
    })?;

    let preview_cookie = cache
        .preview_cookie
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| crate::cache::DEFAULT_PREVIEW_COOKIE.to_string());
    if preview_cookie.is_empty() || preview_cookie.contains(['=', ';', ' ']) {
        return Err(LoadError::invalid(
            "cache.preview_cookie",
            "must be a non-empty cookie name",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        page_limit,
        body_limit_bytes,
        preview_cookie,
    })
}

fn build_routes(routes: RawRoutesSettings) -> Result<SiteRoutes, LoadError> {
    let products = routes
        .products
        .unwrap_or_else(|| DEFAULT_PRODUCTS_PATH.to_string());
    let categories = routes
        .categories
        .unwrap_or_else(|| DEFAULT_CATEGORIES_PATH.to_string());
    let dealers = routes
        .dealers
        .unwrap_or_else(|| DEFAULT_DEALERS_PATH.to_string());
    let faq = routes.faq.unwrap_or_else(|| DEFAULT_FAQ_PATH.to_string());

    SiteRoutes::new(&products, &categories, &dealers, &faq)
        .map_err(|err| LoadError::invalid("routes", err.to_string()))
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let name = site
        .name
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_SITE_NAME.to_string());

    let public_url = site
        .public_url
        .unwrap_or_else(|| DEFAULT_PUBLIC_URL.to_string());
    let public_url = parse_http_url(&public_url)
        .map_err(|reason| LoadError::invalid("site.public_url", reason))?;

    Ok(SiteSettings { name, public_url })
}

fn build_upstream_settings(upstream: RawUpstreamSettings) -> Result<UpstreamSettings, LoadError> {
    let url = match upstream.url.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Some(
            parse_http_url(value).map_err(|reason| LoadError::invalid("upstream.url", reason))?,
        ),
        _ => None,
    };

    let timeout_secs = upstream
        .timeout_seconds
        .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "upstream.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(UpstreamSettings {
        url,
        timeout: Duration::from_secs(timeout_secs),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Clone, Deserialize, Default)]
#[serde(default)]
struct RawWebhookSettings {
    secret: Option<String>,
    max_skew_seconds: Option<u64>,
}

impl std::fmt::Debug for RawWebhookSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawWebhookSettings")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("max_skew_seconds", &self.max_skew_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    page_limit: Option<usize>,
    body_limit_bytes: Option<usize>,
    preview_cookie: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRoutesSettings {
    products: Option<String>,
    categories: Option<String>,
    dealers: Option<String>,
    faq: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    name: Option<String>,
    public_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUpstreamSettings {
    url: Option<String>,
    timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_http_url(value: &str) -> Result<Url, String> {
    let url = Url::parse(value).map_err(|err| format!("invalid URL `{value}`: {err}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme `{other}`")),
    }
}

#[cfg(test)]
mod tests;
