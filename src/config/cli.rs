use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Vetrina binary.
#[derive(Debug, Parser)]
#[command(
    name = "vetrina",
    version,
    about = "CMS revalidation webhook and rendered-page cache"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VETRINA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Print the paths a document change would invalidate, without touching any cache.
    Paths(PathsArgs),
    /// Sign and send a revalidation webhook to a running instance.
    Notify(NotifyArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the accepted webhook timestamp skew (0 disables the check).
    #[arg(long = "webhook-max-skew-seconds", value_name = "SECONDS")]
    pub webhook_max_skew_seconds: Option<u64>,

    /// Toggle the rendered-page cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the maximum number of cached pages.
    #[arg(long = "cache-page-limit", value_name = "COUNT")]
    pub cache_page_limit: Option<usize>,

    /// Override the rendering origin pages are fetched from.
    #[arg(long = "upstream-url", value_name = "URL")]
    pub upstream_url: Option<String>,
}

/// Document identity shared by `paths` and `notify`.
#[derive(Debug, Args, Clone)]
pub struct DocumentArgs {
    /// CMS document type, e.g. `product` or `siteSettings`.
    #[arg(long = "type", value_name = "TYPE")]
    pub document_type: String,

    /// Document slug.
    #[arg(long, value_name = "SLUG")]
    pub slug: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct PathsArgs {
    #[command(flatten)]
    pub document: DocumentArgs,

    /// Print the result as JSON.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct NotifyArgs {
    #[command(flatten)]
    pub document: DocumentArgs,

    /// Webhook endpoint; defaults to the configured listener address.
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,
}
