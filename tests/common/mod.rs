//! Shared helpers for integration tests.

use std::sync::Arc;

use cluster_metrics::stats::{
    AggregationData, DefaultViews, DistributionData, RecordPolicy, Stats, ViewData,
};
use cluster_metrics::Exporter;
use parking_lot::Mutex;

/// A strict context with the default views installed.
pub fn stats_with_defaults() -> (Stats, DefaultViews) {
    let stats = Stats::with_policy(RecordPolicy::Strict);
    let defaults = stats.install_defaults().expect("default views install");
    (stats, defaults)
}

/// Sum value of the row with these tags.
#[allow(dead_code)]
pub fn sum_of(data: &ViewData, tags: &[(&str, &str)]) -> f64 {
    match data.row(tags).map(|r| &r.data) {
        Some(AggregationData::Sum(v)) => *v,
        other => panic!("expected a sum row for {tags:?}, got {other:?}"),
    }
}

/// Distribution of the row with these tags.
#[allow(dead_code)]
pub fn distribution_of<'a>(data: &'a ViewData, tags: &[(&str, &str)]) -> &'a DistributionData {
    match data.row(tags).map(|r| &r.data) {
        Some(AggregationData::Distribution(d)) => d,
        other => panic!("expected a distribution row for {tags:?}, got {other:?}"),
    }
}

/// Exporter that keeps everything it receives.
#[derive(Default)]
#[allow(dead_code)]
pub struct CapturingExporter {
    pub received: Mutex<Vec<ViewData>>,
}

#[allow(dead_code)]
impl CapturingExporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn names(&self) -> Vec<String> {
        self.received.lock().iter().map(|d| d.name.clone()).collect()
    }
}

impl Exporter for CapturingExporter {
    fn name(&self) -> &str {
        "capturing"
    }

    fn export_view(&self, data: &ViewData) {
        self.received.lock().push(data.clone());
    }
}
