use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::{
    render::METRIC_UNSUPPORTED_BLOCKS, revalidate::METRIC_REVALIDATED_PATHS,
};
use crate::config::{LogFormat, LoggingSettings};
use crate::infra::cache::{METRIC_CACHE_ENTRIES, METRIC_CACHE_HIT, METRIC_CACHE_MISS};
use crate::infra::http::api::METRIC_RATE_LIMITED;

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
            METRIC_CACHE_HIT,
            Unit::Count,
            "Total number of page responses served from cache."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Total number of cacheable page requests rendered fresh."
        );
        describe_gauge!(
            METRIC_CACHE_ENTRIES,
            Unit::Count,
            "Current number of cached page responses."
        );
        describe_counter!(
            METRIC_REVALIDATED_PATHS,
            Unit::Count,
            "Total number of paths invalidated by webhooks and comments."
        );
        describe_counter!(
            METRIC_RATE_LIMITED,
            Unit::Count,
            "Total number of comment submissions rejected by the rate limiter."
        );
        describe_counter!(
            METRIC_UNSUPPORTED_BLOCKS,
            Unit::Count,
            "Total number of content blocks skipped because their type is not rendered."
        );
    });
}
