use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::snapshots::{
    METRIC_SNAPSHOT_CONFLICT_TOTAL, METRIC_SNAPSHOT_CREATE_FAILED_TOTAL, METRIC_SNAPSHOT_CREATE_MS,
    METRIC_SNAPSHOT_CREATED_TOTAL,
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
        .map_err(InfraError::from)
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_SNAPSHOT_CREATED_TOTAL,
            Unit::Count,
            "Total number of snapshots created and committed."
        );
        describe_counter!(
            METRIC_SNAPSHOT_CONFLICT_TOTAL,
            Unit::Count,
            "Total number of snapshot creations rejected because an active snapshot exists."
        );
        describe_counter!(
            METRIC_SNAPSHOT_CREATE_FAILED_TOTAL,
            Unit::Count,
            "Total number of snapshot creations that failed for reasons other than a conflict."
        );
        describe_histogram!(
            METRIC_SNAPSHOT_CREATE_MS,
            Unit::Milliseconds,
            "Snapshot creation latency in milliseconds."
        );
    });
}
