//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

use crate::stats::RecordPolicy;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MetricsConfig {
    /// Logging settings.
    pub observability: ObservabilityConfig,

    /// Exporter settings.
    pub export: ExportConfig,

    /// Recording behaviour.
    pub recording: RecordingConfig,

    /// Views registered after the default set.
    pub views: Vec<ViewConfig>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Export configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Run the periodic reporter.
    pub enabled: bool,

    /// Reporter interval in milliseconds.
    pub interval_ms: u64,

    /// Write every snapshot to the log.
    pub log_views: bool,

    /// Publish through the `metrics` facade and serve it for Prometheus.
    pub prometheus_enabled: bool,

    /// Prometheus scrape endpoint bind address.
    pub prometheus_address: String,

    /// Prefix for published metric names.
    pub namespace: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 10_000,
            log_views: false,
            prometheus_enabled: false,
            prometheus_address: "0.0.0.0:9090".to_string(),
            namespace: None,
        }
    }
}

/// Recording configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Panic on invalid observations instead of dropping them.
    /// Defaults to true in debug builds.
    pub strict: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            strict: RecordPolicy::default() == RecordPolicy::Strict,
        }
    }
}

impl RecordingConfig {
    pub fn policy(&self) -> RecordPolicy {
        if self.strict {
            RecordPolicy::Strict
        } else {
            RecordPolicy::Lenient
        }
    }
}

/// Aggregation named in a view entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewAggregation {
    Count,
    Sum,
    Distribution,
}

/// An extra view over an already declared measure.
///
/// Every distinct combination of `tag_keys` values is kept in memory; only
/// use keys with a small set of possible values.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ViewConfig {
    /// View name.
    pub name: String,

    /// Name of the measure the view aggregates.
    pub measure: String,

    pub aggregation: ViewAggregation,

    /// Distribution bounds. Defaults to the latency bounds.
    #[serde(default)]
    pub bounds: Option<Vec<f64>>,

    /// Grouping keys.
    #[serde(default)]
    pub tag_keys: Vec<String>,

    /// Overrides the measure's description.
    #[serde(default)]
    pub description: Option<String>,
}
