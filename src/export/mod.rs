//! Export subsystem.
//!
//! # Data Flow
//! ```text
//! Pull:   caller → Stats::snapshot(view) → ViewData
//!
//! Push:   reporter.rs (periodic tick, final flush on shutdown)
//!         → Stats::export_all
//!         → Exporter::export_view for every registered exporter
//!             → log.rs     (tracing events)
//!             → facade.rs  (`metrics` gauges for any installed recorder)
//! ```
//!
//! # Design Decisions
//! - Exporters receive immutable snapshots and never touch live state
//! - Wire formats belong to the recorder behind the `metrics` facade

pub mod facade;
pub mod log;
pub mod reporter;

use crate::stats::ViewData;

pub use facade::FacadeExporter;
pub use log::LogExporter;
pub use reporter::Reporter;

/// Receives view snapshots pushed by [`Stats::export_all`](crate::stats::Stats::export_all)
/// and by view unregistration.
pub trait Exporter: Send + Sync {
    /// Name used for logging and for unregistering.
    fn name(&self) -> &str;

    /// Handle one view's snapshot. Must not block for long.
    fn export_view(&self, data: &ViewData);
}
