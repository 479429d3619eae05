//! Exporter that writes snapshots to the log.

use crate::stats::{AggregationData, ViewData};

use super::Exporter;

/// Emits one `tracing` event per row.
#[derive(Debug, Default)]
pub struct LogExporter;

impl LogExporter {
    pub fn new() -> Self {
        Self
    }
}

fn format_tags(tags: &[(String, String)]) -> String {
    tags.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

impl Exporter for LogExporter {
    fn name(&self) -> &str {
        "log"
    }

    fn export_view(&self, data: &ViewData) {
        for row in &data.rows {
            let tags = format_tags(&row.tags);
            match &row.data {
                AggregationData::Count(n) => {
                    tracing::info!(view = %data.name, tags = %tags, count = n, "view data");
                }
                AggregationData::Sum(v) => {
                    tracing::info!(view = %data.name, tags = %tags, sum = v, "view data");
                }
                AggregationData::Distribution(d) => {
                    tracing::info!(
                        view = %data.name,
                        tags = %tags,
                        count = d.count,
                        mean = d.mean,
                        min = d.min,
                        max = d.max,
                        "view data"
                    );
                }
            }
        }
    }
}
