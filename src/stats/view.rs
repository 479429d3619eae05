//! Views and the view registry.
//!
//! # Data Flow
//! ```text
//! Stats::record(tags, measurements)
//!     → ViewRegistry::views_for(measure)   (lock-free index read)
//!     → ViewState::fold(tags, value)
//!         → tag tuple for the view's keys
//!         → per-tuple aggregate (created lazily)
//!
//! Exporter / caller
//!     → ViewRegistry::snapshot(name) → ViewData
//! ```
//!
//! # Design Decisions
//! - The index of views per measure sits behind an `ArcSwap`, so recording
//!   never takes a registry lock; registration rebuilds and swaps it
//! - Each tag tuple owns its own mutex; unrelated tuples never share one
//! - Registered views are immutable; re-registering an identical view is a no-op
//!
//! # Cardinality
//! The per-view map of tag tuples is unbounded. Callers decide which tag keys
//! a view groups by and must keep their value sets bounded: host names are
//! fine, request IDs or client addresses are not.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

use super::aggregation::{Aggregation, AggregationData, AggregationKind};
use super::error::{check_name, StatsError, StatsResult};
use super::measure::{Measure, Unit};
use super::tag::{TagKey, TagMap};

/// A measure bound to an aggregation and a set of grouping keys.
///
/// Every distinct combination of values for `tag_keys` gets its own aggregate,
/// so only group by keys whose values come from a small, bounded set.
#[derive(Debug, Clone)]
pub struct View {
    name: String,
    description: String,
    measure: Measure,
    aggregation: Aggregation,
    tag_keys: Vec<TagKey>,
}

impl View {
    /// View named after its measure, without grouping keys.
    pub fn new(measure: &Measure, aggregation: Aggregation) -> Self {
        Self {
            name: measure.name().to_string(),
            description: measure.description().to_string(),
            measure: measure.clone(),
            aggregation,
            tag_keys: Vec::new(),
        }
    }

    /// Report under a different name than the measure's.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Grouping keys. Stored sorted by name and de-duplicated.
    pub fn with_tag_keys<'a>(mut self, keys: impl IntoIterator<Item = &'a TagKey>) -> Self {
        self.tag_keys.extend(keys.into_iter().cloned());
        self.tag_keys.sort();
        self.tag_keys.dedup();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn measure(&self) -> &Measure {
        &self.measure
    }

    pub fn aggregation(&self) -> &Aggregation {
        &self.aggregation
    }

    pub fn tag_keys(&self) -> &[TagKey] {
        &self.tag_keys
    }

    /// Same measure, aggregation and keys; description is not compared.
    fn same(&self, other: &View) -> bool {
        self.measure == other.measure
            && self.aggregation == other.aggregation
            && self.tag_keys == other.tag_keys
    }
}

/// Values for a view's tag keys, in key order. Missing tags are empty strings.
type TagTuple = Vec<String>;

/// A registered view and its accumulated rows.
#[derive(Debug)]
pub(crate) struct ViewState {
    view: View,
    start: SystemTime,
    rows: DashMap<TagTuple, Arc<Mutex<AggregationData>>>,
    /// Set by unregistration before the final snapshot.
    closed: AtomicBool,
}

impl ViewState {
    fn new(view: View) -> Self {
        Self {
            view,
            start: SystemTime::now(),
            rows: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn tuple_for(&self, tags: &TagMap) -> TagTuple {
        self.view
            .tag_keys
            .iter()
            .map(|k| tags.get(k).unwrap_or_default().to_string())
            .collect()
    }

    /// Fold one observation into the row for its tag tuple.
    ///
    /// A closed view drops the observation: its final snapshot is already out.
    pub(crate) fn fold(&self, tags: &TagMap, value: f64) {
        let tuple = self.tuple_for(tags);

        // Fast path only holds the shard read lock long enough to clone the Arc.
        let row = match self.rows.get(&tuple) {
            Some(row) => row.value().clone(),
            None => self
                .rows
                .entry(tuple)
                .or_insert_with(|| Arc::new(Mutex::new(self.view.aggregation.new_data())))
                .value()
                .clone(),
        };

        let mut data = row.lock();
        // Checked under the row lock: the final snapshot locks every row after
        // closing, so anything folded here is either in it or rejected.
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!(view = %self.view.name, "Dropping observation for unregistered view");
            return;
        }
        data.add_sample(value);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn snapshot(&self) -> ViewData {
        let mut rows: Vec<Row> = self
            .rows
            .iter()
            .map(|entry| Row {
                tags: self
                    .view
                    .tag_keys
                    .iter()
                    .zip(entry.key())
                    .map(|(k, v)| (k.name().to_string(), v.clone()))
                    .collect(),
                data: entry.value().lock().clone(),
            })
            .collect();
        rows.sort_by(|a, b| a.tags.cmp(&b.tags));

        ViewData {
            name: self.view.name.clone(),
            description: self.view.description.clone(),
            measure: self.view.measure.name().to_string(),
            unit: self.view.measure.unit(),
            aggregation: self.view.aggregation.kind(),
            start: self.start,
            end: SystemTime::now(),
            rows,
        }
    }
}

/// Point-in-time contents of one view.
#[derive(Debug, Clone, Serialize)]
pub struct ViewData {
    pub name: String,
    pub description: String,
    pub measure: String,
    pub unit: Unit,
    pub aggregation: AggregationKind,
    pub start: SystemTime,
    pub end: SystemTime,
    /// Sorted by tag values.
    pub rows: Vec<Row>,
}

impl ViewData {
    /// Row whose tags match `tags` exactly, in the view's key order.
    pub fn row(&self, tags: &[(&str, &str)]) -> Option<&Row> {
        self.rows.iter().find(|row| {
            row.tags.len() == tags.len()
                && row
                    .tags
                    .iter()
                    .zip(tags)
                    .all(|((k, v), (tk, tv))| k == tk && v == tv)
        })
    }
}

/// Aggregate for one tag tuple.
#[derive(Debug, Clone, Serialize)]
pub struct Row {
    /// `(key name, value)` pairs in the view's key order.
    pub tags: Vec<(String, String)>,
    pub data: AggregationData,
}

/// Registered views for one stats context.
pub struct ViewRegistry {
    views: DashMap<String, Arc<ViewState>>,
    /// Measure name → views recording it. Swapped wholesale on (un)registration.
    by_measure: ArcSwap<HashMap<String, Vec<Arc<ViewState>>>>,
    /// Serializes writers of `by_measure`.
    write_lock: Mutex<()>,
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewRegistry")
            .field("views", &self.views.len())
            .finish()
    }
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self {
            views: DashMap::new(),
            by_measure: ArcSwap::from_pointee(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Register a view. Returns `true` if it was newly added and `false` if an
    /// identical view was already present (its state is left untouched).
    pub fn register(&self, view: View) -> StatsResult<bool> {
        check_name(view.name()).map_err(|reason| StatsError::InvalidViewName {
            name: view.name().to_string(),
            reason,
        })?;

        let _guard = self.write_lock.lock();

        if let Some(existing) = self.views.get(view.name()) {
            return if existing.view.same(&view) {
                Ok(false)
            } else {
                Err(StatsError::ConflictingView(view.name().to_string()))
            };
        }

        let state = Arc::new(ViewState::new(view));
        self.views.insert(state.view.name.clone(), state.clone());

        let mut index = HashMap::clone(&self.by_measure.load());
        index
            .entry(state.view.measure.name().to_string())
            .or_default()
            .push(state);
        self.by_measure.store(Arc::new(index));

        Ok(true)
    }

    /// Stop folding into a view and return its final contents.
    ///
    /// The view leaves the recording index and is closed before the snapshot is
    /// taken, so the returned data is the last the view will ever report. A
    /// recorder that loaded the old index before the swap either lands in
    /// the snapshot or is dropped.
    pub fn unregister(&self, name: &str) -> StatsResult<ViewData> {
        let _guard = self.write_lock.lock();

        let (_, state) = self
            .views
            .remove(name)
            .ok_or_else(|| StatsError::UnknownView(name.to_string()))?;

        let mut index = HashMap::clone(&self.by_measure.load());
        let measure = state.view.measure.name();
        if let Some(list) = index.get_mut(measure) {
            list.retain(|s| !Arc::ptr_eq(s, &state));
            if list.is_empty() {
                index.remove(measure);
            }
        }
        self.by_measure.store(Arc::new(index));

        state.close();
        Ok(state.snapshot())
    }

    /// Views currently recording `measure`.
    pub(crate) fn views_for(&self, measure: &Measure) -> Vec<Arc<ViewState>> {
        self.by_measure
            .load()
            .get(measure.name())
            .cloned()
            .unwrap_or_default()
    }

    pub fn find(&self, name: &str) -> Option<View> {
        self.views.get(name).map(|s| s.view.clone())
    }

    pub fn snapshot(&self, name: &str) -> Option<ViewData> {
        let state = self.views.get(name)?.value().clone();
        Some(state.snapshot())
    }

    /// Snapshot every view, ordered by name.
    pub fn snapshot_all(&self) -> Vec<ViewData> {
        let states: Vec<Arc<ViewState>> = self.views.iter().map(|e| e.value().clone()).collect();
        let mut all: Vec<ViewData> = states.iter().map(|s| s.snapshot()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Names of all registered views, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.views.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::measure::{MeasureKind, MeasureRegistry};
    use crate::stats::tag::TagKeyRegistry;

    fn measure(name: &str) -> Measure {
        MeasureRegistry::new()
            .declare(name, "test measure", Unit::Dimensionless, MeasureKind::Int64)
            .unwrap()
    }

    fn record(registry: &ViewRegistry, m: &Measure, tags: &TagMap, value: f64) {
        for state in registry.views_for(m) {
            state.fold(tags, value);
        }
    }

    #[test]
    fn test_view_defaults_to_measure_name() {
        let m = measure("cluster/peer_count");
        let view = View::new(&m, Aggregation::Count);
        assert_eq!(view.name(), "cluster/peer_count");
        assert_eq!(view.description(), "test measure");

        let renamed = view.with_name("peers");
        assert_eq!(renamed.name(), "peers");
    }

    #[test]
    fn test_tag_keys_are_canonical() {
        let keys = TagKeyRegistry::new();
        let service = keys.new_key("service").unwrap();
        let method = keys.new_key("method").unwrap();
        let m = measure("requests");

        let a = View::new(&m, Aggregation::Sum).with_tag_keys([&service, &method]);
        let b = View::new(&m, Aggregation::Sum).with_tag_keys([&method, &service, &method]);

        assert_eq!(a.tag_keys(), b.tag_keys());
        assert_eq!(a.tag_keys()[0].name(), "method");
        assert!(a.same(&b));
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = ViewRegistry::new();
        let m = measure("pins");

        assert!(registry.register(View::new(&m, Aggregation::Sum)).unwrap());
        record(&registry, &m, &TagMap::new(), 3.0);

        assert!(!registry.register(View::new(&m, Aggregation::Sum)).unwrap());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.views_for(&m).len(), 1);

        let data = registry.snapshot("pins").unwrap();
        assert!(matches!(data.rows[0].data, AggregationData::Sum(v) if v == 3.0));
    }

    #[test]
    fn test_conflicting_view_is_rejected() {
        let registry = ViewRegistry::new();
        let m = measure("pins");
        registry.register(View::new(&m, Aggregation::Sum)).unwrap();
        record(&registry, &m, &TagMap::new(), 1.0);

        let err = registry.register(View::new(&m, Aggregation::Count)).unwrap_err();
        assert!(matches!(err, StatsError::ConflictingView(ref n) if n == "pins"));

        let data = registry.snapshot("pins").unwrap();
        assert_eq!(data.aggregation, AggregationKind::Sum);
        assert!(matches!(data.rows[0].data, AggregationData::Sum(v) if v == 1.0));
    }

    #[test]
    fn test_invalid_view_name() {
        let registry = ViewRegistry::new();
        let m = measure("pins");
        let err = registry
            .register(View::new(&m, Aggregation::Sum).with_name(""))
            .unwrap_err();
        assert!(matches!(err, StatsError::InvalidViewName { .. }));
    }

    #[test]
    fn test_grouping_by_tags() {
        let keys = TagKeyRegistry::new();
        let host = keys.new_key("host").unwrap();
        let other = keys.new_key("other").unwrap();
        let m = measure("tracked");

        let registry = ViewRegistry::new();
        registry
            .register(View::new(&m, Aggregation::Sum).with_tag_keys([&host]))
            .unwrap();

        record(&registry, &m, &TagMap::new().with(&host, "a").with(&other, "x"), 2.0);
        record(&registry, &m, &TagMap::new().with(&host, "a").with(&other, "y"), 3.0);
        record(&registry, &m, &TagMap::new().with(&host, "b"), 5.0);
        record(&registry, &m, &TagMap::new(), 7.0);

        let data = registry.snapshot("tracked").unwrap();
        assert_eq!(data.rows.len(), 3);
        assert!(matches!(data.row(&[("host", "")]).unwrap().data, AggregationData::Sum(v) if v == 7.0));
        assert!(matches!(data.row(&[("host", "a")]).unwrap().data, AggregationData::Sum(v) if v == 5.0));
        assert!(matches!(data.row(&[("host", "b")]).unwrap().data, AggregationData::Sum(v) if v == 5.0));
    }

    #[test]
    fn test_unregister_returns_final_data() {
        let registry = ViewRegistry::new();
        let m = measure("pins");
        registry.register(View::new(&m, Aggregation::Count)).unwrap();
        record(&registry, &m, &TagMap::new(), 1.0);
        record(&registry, &m, &TagMap::new(), 1.0);

        let last = registry.unregister("pins").unwrap();
        assert!(matches!(last.rows[0].data, AggregationData::Count(2)));

        assert!(registry.snapshot("pins").is_none());
        assert!(registry.views_for(&m).is_empty());
        assert!(matches!(registry.unregister("pins"), Err(StatsError::UnknownView(_))));

        // Re-registering starts from scratch.
        registry.register(View::new(&m, Aggregation::Count)).unwrap();
        assert!(registry.snapshot("pins").unwrap().rows.is_empty());
    }

    #[test]
    fn test_stale_recorder_cannot_fold_after_final_snapshot() {
        let keys = TagKeyRegistry::new();
        let host = keys.new_key("host").unwrap();
        let registry = ViewRegistry::new();
        let m = measure("pins");
        registry
            .register(View::new(&m, Aggregation::Sum).with_tag_keys([&host]))
            .unwrap();
        record(&registry, &m, &TagMap::new().with(&host, "a"), 2.0);

        // A recorder that loaded the index before unregistration.
        let stale = registry.views_for(&m);
        let last = registry.unregister("pins").unwrap();

        for state in &stale {
            state.fold(&TagMap::new().with(&host, "a"), 5.0);
            state.fold(&TagMap::new().with(&host, "b"), 7.0);
        }

        assert_eq!(last.rows.len(), 1);
        assert!(matches!(last.rows[0].data, AggregationData::Sum(v) if v == 2.0));

        let after = stale[0].snapshot();
        assert_eq!(after.rows.len(), 2);
        assert!(matches!(after.row(&[("host", "a")]).unwrap().data, AggregationData::Sum(v) if v == 2.0));
        assert!(matches!(after.row(&[("host", "b")]).unwrap().data, AggregationData::Sum(v) if v == 0.0));
    }

    #[test]
    fn test_two_views_on_one_measure() {
        let registry = ViewRegistry::new();
        let m = measure("latency");
        registry.register(View::new(&m, Aggregation::Count)).unwrap();
        registry
            .register(View::new(&m, Aggregation::latency()).with_name("latency_dist"))
            .unwrap();

        record(&registry, &m, &TagMap::new(), 250.0);

        assert_eq!(registry.names(), vec!["latency".to_string(), "latency_dist".to_string()]);
        let all = registry.snapshot_all();
        assert_eq!(all.len(), 2);
        assert!(matches!(all[0].rows[0].data, AggregationData::Count(1)));
        assert!(matches!(all[1].rows[0].data, AggregationData::Distribution(ref d) if d.count == 1));
    }
}
