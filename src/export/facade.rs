//! Exporter that republishes snapshots through the `metrics` facade.
//!
//! # Mapping
//! - `Count` / `Sum` rows: one gauge per tag tuple, labelled with the tags
//! - `Distribution` rows: `<name>_count`, `<name>_sum`, and cumulative
//!   `<name>_bucket` gauges labelled `lt` (values strictly below the bound),
//!   plus `lt="+Inf"`
//!
//! Gauges are set to the aggregate value, so whatever recorder is installed
//! sees the current totals at every export tick.

use dashmap::DashSet;
use metrics::Label;

use crate::stats::{AggregationData, DistributionData, ViewData};

use super::Exporter;

/// Publishes view data as `metrics` gauges.
#[derive(Debug, Default)]
pub struct FacadeExporter {
    namespace: Option<String>,
    described: DashSet<String>,
}

impl FacadeExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix every metric name with `<namespace>_`.
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            described: DashSet::new(),
        }
    }

    /// Metric name for a view: namespace prefix, anything outside
    /// `[a-zA-Z0-9_:]` replaced by `_`.
    pub fn metric_name(&self, view: &str) -> String {
        let sanitized: String = view
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == ':' { c } else { '_' })
            .collect();
        match &self.namespace {
            Some(ns) => format!("{ns}_{sanitized}"),
            None => sanitized,
        }
    }

    fn describe(&self, name: &str, data: &ViewData) {
        if self.described.insert(name.to_string()) {
            metrics::describe_gauge!(name.to_string(), data.description.clone());
        }
    }

    fn publish_distribution(&self, name: &str, labels: &[Label], dist: &DistributionData) {
        metrics::gauge!(format!("{name}_count"), labels.to_vec()).set(dist.count as f64);
        metrics::gauge!(format!("{name}_sum"), labels.to_vec()).set(dist.sum);

        let bucket = format!("{name}_bucket");
        let mut cumulative = 0u64;
        for (bound, count) in dist.bounds.as_slice().iter().zip(&dist.bucket_counts) {
            cumulative += count;
            let mut with_bound = labels.to_vec();
            with_bound.push(Label::new("lt", bound.to_string()));
            metrics::gauge!(bucket.clone(), with_bound).set(cumulative as f64);
        }

        let mut with_bound = labels.to_vec();
        with_bound.push(Label::new("lt", "+Inf"));
        metrics::gauge!(bucket, with_bound).set(dist.count as f64);
    }
}

impl Exporter for FacadeExporter {
    fn name(&self) -> &str {
        "metrics-facade"
    }

    fn export_view(&self, data: &ViewData) {
        let name = self.metric_name(&data.name);
        self.describe(&name, data);

        for row in &data.rows {
            let labels: Vec<Label> = row
                .tags
                .iter()
                .map(|(k, v)| Label::new(k.clone(), v.clone()))
                .collect();

            match &row.data {
                AggregationData::Count(n) => {
                    metrics::gauge!(name.clone(), labels).set(*n as f64);
                }
                AggregationData::Sum(v) => {
                    metrics::gauge!(name.clone(), labels).set(*v);
                }
                AggregationData::Distribution(dist) => {
                    self.publish_distribution(&name, &labels, dist);
                }
            }
        }
    }
}
