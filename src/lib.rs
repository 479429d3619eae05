//! Instrumentation core for a cluster coordination service.
//!
//! Tag keys, measures, aggregations and views, plus the default view set
//! every peer exposes. Producers record against a [`Stats`] context;
//! exporters read snapshots from it.

pub mod config;
pub mod export;
pub mod lifecycle;
pub mod observability;
pub mod stats;

pub use config::MetricsConfig;
pub use export::Exporter;
pub use lifecycle::Shutdown;
pub use stats::{Stats, StatsError};
