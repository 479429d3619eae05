//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the `Stats` context with the configured recording policy
//! - Install the default view set, then the configured extra views
//! - Register the configured exporters
//!
//! # Design Decisions
//! - Fail fast: the first registration error is returned to the caller
//! - Extra views come after the defaults so they can use the default measures

use std::sync::Arc;

use crate::config::{MetricsConfig, ViewAggregation, ViewConfig};
use crate::export::{FacadeExporter, LogExporter};
use crate::stats::{Aggregation, DefaultViews, Stats, StatsError, StatsResult, View};

/// Everything `main` needs after a successful startup.
pub struct Bootstrap {
    pub stats: Stats,
    pub defaults: DefaultViews,
}

/// Build a ready-to-record `Stats` context from configuration.
pub fn bootstrap(config: &MetricsConfig) -> StatsResult<Bootstrap> {
    let stats = Stats::with_policy(config.recording.policy());
    let defaults = stats.install_defaults()?;

    for view in &config.views {
        register_configured(&stats, view)?;
    }

    if config.export.log_views {
        stats.register_exporter(Arc::new(LogExporter::new()));
    }
    if config.export.prometheus_enabled {
        let exporter = match &config.export.namespace {
            Some(ns) => FacadeExporter::with_namespace(ns.clone()),
            None => FacadeExporter::new(),
        };
        stats.register_exporter(Arc::new(exporter));
    }

    tracing::info!(
        views = stats.view_names().len(),
        policy = ?stats.policy(),
        "Stats initialized"
    );

    Ok(Bootstrap { stats, defaults })
}

fn register_configured(stats: &Stats, config: &ViewConfig) -> StatsResult<()> {
    let measure = stats
        .get_measure(&config.measure)
        .ok_or_else(|| StatsError::UnknownMeasure {
            view: config.name.clone(),
            measure: config.measure.clone(),
        })?;

    let aggregation = match config.aggregation {
        ViewAggregation::Count => Aggregation::Count,
        ViewAggregation::Sum => Aggregation::Sum,
        ViewAggregation::Distribution => match &config.bounds {
            Some(bounds) => Aggregation::distribution(bounds)?,
            None => Aggregation::latency(),
        },
    };

    let keys = config
        .tag_keys
        .iter()
        .map(|name| stats.new_key(name))
        .collect::<StatsResult<Vec<_>>>()?;

    let mut view = View::new(&measure, aggregation)
        .with_name(config.name.clone())
        .with_tag_keys(&keys);
    if let Some(description) = &config.description {
        view = view.with_description(description.clone());
    }

    stats.register_view(view)?;
    Ok(())
}
