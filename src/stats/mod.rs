//! Metrics model and registry.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Stats::new()
//!     → new_key / declare / register_view   (tag.rs, measure.rs, view.rs)
//!     → install_defaults                    (defaults.rs)
//!
//! Producers (any thread):
//!     Stats::record(tags, [measure.int(1)])
//!     → views recording the measure fold the value per tag tuple
//!
//! Exporters:
//!     snapshot / snapshot_all   (pull)
//!     export_all → Exporter::export_view   (push)
//! ```
//!
//! # Design Decisions
//! - `Stats` is an explicit context object, not process-global state; tests
//!   build as many independent instances as they like
//! - Registration errors are returned to the caller, who decides whether to abort
//! - Recording never returns an error; misuse is handled by [`RecordPolicy`]

pub mod aggregation;
pub mod defaults;
pub mod error;
pub mod measure;
pub mod tag;
pub mod view;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::export::Exporter;

pub use aggregation::{
    Aggregation, AggregationData, AggregationKind, Bounds, DistributionData, BYTES_BOUNDS,
    LATENCY_BOUNDS,
};
pub use defaults::{DefaultViews, CLIENT_IP_ATTRIBUTE, DEFAULT_VIEW_NAMES};
pub use error::{StatsError, StatsResult};
pub use measure::{Measure, MeasureKind, MeasureRegistry, Measurement, Unit};
pub use tag::{TagKey, TagKeyRegistry, TagMap};
pub use view::{Row, View, ViewData, ViewRegistry};

/// What recording does with an observation it cannot accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPolicy {
    /// Panic. For development and tests.
    Strict,
    /// Log a warning and drop the observation.
    Lenient,
}

impl Default for RecordPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            RecordPolicy::Strict
        } else {
            RecordPolicy::Lenient
        }
    }
}

struct StatsInner {
    tags: TagKeyRegistry,
    measures: MeasureRegistry,
    views: ViewRegistry,
    exporters: RwLock<Vec<Arc<dyn Exporter>>>,
    policy: RecordPolicy,
}

/// Shared handle to one set of registries. Cloning is cheap.
#[derive(Clone)]
pub struct Stats {
    inner: Arc<StatsInner>,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stats")
            .field("tag_keys", &self.inner.tags.len())
            .field("measures", &self.inner.measures.len())
            .field("views", &self.inner.views.len())
            .field("policy", &self.inner.policy)
            .finish()
    }
}

impl Stats {
    /// Empty context with the build's default recording policy.
    pub fn new() -> Self {
        Self::with_policy(RecordPolicy::default())
    }

    pub fn with_policy(policy: RecordPolicy) -> Self {
        Self {
            inner: Arc::new(StatsInner {
                tags: TagKeyRegistry::new(),
                measures: MeasureRegistry::new(),
                views: ViewRegistry::new(),
                exporters: RwLock::new(Vec::new()),
                policy,
            }),
        }
    }

    pub fn policy(&self) -> RecordPolicy {
        self.inner.policy
    }

    // --- Registration ---

    /// Mint a tag key (idempotent per name).
    pub fn new_key(&self, name: &str) -> StatsResult<TagKey> {
        self.inner.tags.new_key(name)
    }

    /// Declare a measure (idempotent for identical declarations).
    pub fn declare(
        &self,
        name: &str,
        description: &str,
        unit: Unit,
        kind: MeasureKind,
    ) -> StatsResult<Measure> {
        self.inner.measures.declare(name, description, unit, kind)
    }

    pub fn get_measure(&self, name: &str) -> Option<Measure> {
        self.inner.measures.get(name)
    }

    /// Register a view. Identical re-registration returns `Ok(false)` and keeps
    /// the accumulated data.
    pub fn register_view(&self, view: View) -> StatsResult<bool> {
        if !self.inner.measures.contains(view.measure()) {
            return Err(StatsError::UnknownMeasure {
                view: view.name().to_string(),
                measure: view.measure().name().to_string(),
            });
        }
        if let Some(key) = view.tag_keys().iter().find(|k| !self.inner.tags.contains(k)) {
            return Err(StatsError::InvalidKeyName {
                name: key.name().to_string(),
                reason: "tag key was not created by this context",
            });
        }
        let name = view.name().to_string();
        let added = self.inner.views.register(view)?;
        if added {
            tracing::info!(view = %name, "View registered");
        }
        Ok(added)
    }

    /// Stop a view, push its final contents to every exporter, and return them.
    ///
    /// Recordings racing with the call either appear in the returned data or
    /// are dropped; none is folded after it.
    pub fn unregister_view(&self, name: &str) -> StatsResult<ViewData> {
        let last = self.inner.views.unregister(name)?;
        tracing::info!(view = name, rows = last.rows.len(), "View unregistered, flushing final data");
        for exporter in self.exporters() {
            exporter.export_view(&last);
        }
        Ok(last)
    }

    pub fn find_view(&self, name: &str) -> Option<View> {
        self.inner.views.find(name)
    }

    pub fn view_names(&self) -> Vec<String> {
        self.inner.views.names()
    }

    /// Declare the default keys and measures and register the default views.
    pub fn install_defaults(&self) -> StatsResult<DefaultViews> {
        defaults::install(self)
    }

    // --- Recording ---

    /// Record one observation.
    pub fn record_one(&self, tags: &TagMap, measurement: Measurement) {
        self.record(tags, std::slice::from_ref(&measurement));
    }

    /// Record observations sharing one set of tags.
    ///
    /// Never fails. Observations this context cannot accept (a measure or tag
    /// key from another context, an integer measure given a real value, NaN or
    /// an infinity) are handled according to the [`RecordPolicy`].
    pub fn record(&self, tags: &TagMap, measurements: &[Measurement]) {
        if let Some(key) = tags.iter().map(|(k, _)| k).find(|k| !self.inner.tags.contains(k)) {
            self.reject(format_args!("tag key {:?} was not created by this context", key.name()));
            return;
        }
        if let Some((key, _)) = tags.iter().find(|(_, v)| error::check_printable(v).is_err()) {
            self.reject(format_args!("tag value for {:?} is not printable ASCII", key.name()));
            return;
        }

        for m in measurements {
            let measure = m.measure();
            if !self.inner.measures.contains(measure) {
                self.reject(format_args!("measure {:?} is not declared in this context", measure.name()));
                continue;
            }
            if measure.kind() == MeasureKind::Int64 && m.kind() == MeasureKind::Float64 {
                self.reject(format_args!("real value recorded for integer measure {:?}", measure.name()));
                continue;
            }
            if !m.value().is_finite() {
                self.reject(format_args!(
                    "non-finite value {} recorded for measure {:?}",
                    m.value(),
                    measure.name()
                ));
                continue;
            }

            for view in self.inner.views.views_for(measure) {
                view.fold(tags, m.value());
            }
        }
    }

    fn reject(&self, reason: std::fmt::Arguments<'_>) {
        match self.inner.policy {
            RecordPolicy::Strict => panic!("invalid observation: {reason}"),
            RecordPolicy::Lenient => {
                tracing::warn!(reason = %reason, "Dropping invalid observation");
            }
        }
    }

    // --- Export ---

    pub fn snapshot(&self, view: &str) -> Option<ViewData> {
        self.inner.views.snapshot(view)
    }

    pub fn snapshot_all(&self) -> Vec<ViewData> {
        self.inner.views.snapshot_all()
    }

    pub fn register_exporter(&self, exporter: Arc<dyn Exporter>) {
        tracing::info!(exporter = exporter.name(), "Exporter registered");
        self.inner.exporters.write().push(exporter);
    }

    /// Remove every exporter with this name. Returns how many were removed.
    pub fn unregister_exporter(&self, name: &str) -> usize {
        let mut exporters = self.inner.exporters.write();
        let before = exporters.len();
        exporters.retain(|e| e.name() != name);
        before - exporters.len()
    }

    /// Push a snapshot of every view to every exporter.
    pub fn export_all(&self) {
        let exporters = self.exporters();
        if exporters.is_empty() {
            return;
        }
        for data in self.snapshot_all() {
            for exporter in &exporters {
                exporter.export_view(&data);
            }
        }
    }

    fn exporters(&self) -> Vec<Arc<dyn Exporter>> {
        self.inner.exporters.read().clone()
    }
}
