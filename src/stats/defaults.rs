//! The default view set every cluster peer exposes.

use super::aggregation::Aggregation;
use super::error::{StatsError, StatsResult};
use super::measure::{Measure, MeasureKind, Unit};
use super::tag::TagKey;
use super::view::View;
use super::Stats;

/// Attribute name for the client address on HTTP spans.
pub const CLIENT_IP_ATTRIBUTE: &str = "http.client.ip";

pub const HOST_KEY: &str = "host";
pub const SERVICE_KEY: &str = "service";
pub const METHOD_KEY: &str = "method";

pub const PIN_COUNT: &str = "cluster/pin_count";
pub const TRACKER_PIN_COUNT: &str = "pintracker/pin_count";
pub const PEER_COUNT: &str = "cluster/peer_count";
pub const REQUEST_COUNT: &str = "libp2p_gorpc/request_count";
pub const REQUEST_LATENCY: &str = "libp2p_gorpc/request_latency";

/// Default view names in installation order.
pub const DEFAULT_VIEW_NAMES: [&str; 5] = [
    PIN_COUNT,
    TRACKER_PIN_COUNT,
    PEER_COUNT,
    REQUEST_COUNT,
    REQUEST_LATENCY,
];

/// Handles producers use to record against the default views.
#[derive(Debug, Clone)]
pub struct DefaultViews {
    pub host: TagKey,
    pub service: TagKey,
    pub method: TagKey,

    /// Pins the cluster tracks.
    pub pin_count: Measure,
    /// Pins the local peer tracks.
    pub tracker_pin_count: Measure,
    /// Peers currently in the cluster.
    pub peer_count: Measure,
    /// RPC requests made.
    pub request_count: Measure,
    /// RPC request latency in milliseconds.
    pub request_latency: Measure,
}

impl DefaultViews {
    fn views(&self) -> [View; 5] {
        [
            View::new(&self.pin_count, Aggregation::Sum),
            View::new(&self.tracker_pin_count, Aggregation::Sum).with_tag_keys([&self.host]),
            View::new(&self.peer_count, Aggregation::Count).with_tag_keys([&self.host]),
            View::new(&self.request_count, Aggregation::Sum)
                .with_tag_keys([&self.service, &self.method]),
            View::new(&self.request_latency, Aggregation::latency())
                .with_name(REQUEST_LATENCY)
                .with_tag_keys([&self.service, &self.method]),
        ]
    }
}

fn wrap(view: &'static str) -> impl FnOnce(StatsError) -> StatsError {
    move |source| StatsError::Registration {
        view,
        source: Box::new(source),
    }
}

/// Declare the default keys and measures and register the default views.
///
/// Safe to call again: every step is idempotent and accumulated data is kept.
pub(crate) fn install(stats: &Stats) -> StatsResult<DefaultViews> {
    let host = stats.new_key(HOST_KEY).map_err(wrap(TRACKER_PIN_COUNT))?;
    let service = stats.new_key(SERVICE_KEY).map_err(wrap(REQUEST_COUNT))?;
    let method = stats.new_key(METHOD_KEY).map_err(wrap(REQUEST_COUNT))?;

    let int = |name: &'static str, description: &str| {
        stats
            .declare(name, description, Unit::Dimensionless, MeasureKind::Int64)
            .map_err(wrap(name))
    };

    let defaults = DefaultViews {
        pin_count: int(PIN_COUNT, "Number of pins")?,
        tracker_pin_count: int(TRACKER_PIN_COUNT, "Number of pins")?,
        peer_count: int(PEER_COUNT, "Number of cluster peers")?,
        request_count: int(REQUEST_COUNT, "Number of requests")?,
        request_latency: stats
            .declare(
                REQUEST_LATENCY,
                "Latency of RPC request",
                Unit::Milliseconds,
                MeasureKind::Float64,
            )
            .map_err(wrap(REQUEST_LATENCY))?,
        host,
        service,
        method,
    };

    for (name, view) in DEFAULT_VIEW_NAMES.into_iter().zip(defaults.views()) {
        let added = stats.register_view(view).map_err(wrap(name))?;
        if !added {
            tracing::debug!(view = name, "Default view already registered");
        }
    }

    tracing::info!(views = DEFAULT_VIEW_NAMES.len(), "Default views installed");
    Ok(defaults)
}
