use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "vetrina_page_cache_hit_total",
            Unit::Count,
            "Total number of rendered-page cache hits."
        );
        describe_counter!(
            "vetrina_page_cache_miss_total",
            Unit::Count,
            "Total number of rendered-page cache misses."
        );
        describe_counter!(
            "vetrina_page_cache_evict_total",
            Unit::Count,
            "Total number of rendered-page cache evictions due to capacity."
        );
        describe_counter!(
            "vetrina_page_cache_invalidated_total",
            Unit::Count,
            "Total number of cached pages dropped by revalidation."
        );
        describe_counter!(
            "vetrina_revalidation_total",
            Unit::Count,
            "Total number of revalidations, labelled by document type."
        );
        describe_counter!(
            "vetrina_webhook_rejected_total",
            Unit::Count,
            "Total number of rejected revalidation webhooks, labelled by reason."
        );
    });
}
