//! Measure declarations.
//!
//! A measure names a quantity producers observe. Declaring is a startup
//! operation; recording goes through [`Stats::record`](super::Stats::record).

use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::error::{check_name, StatsError, StatsResult};

/// Unit of a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Dimensionless,
    Bytes,
    Milliseconds,
    Seconds,
}

impl Unit {
    /// Symbolic unit string as exporters expect it.
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Dimensionless => "1",
            Unit::Bytes => "By",
            Unit::Milliseconds => "ms",
            Unit::Seconds => "s",
        }
    }
}

/// Value kind of a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureKind {
    /// Integer counts.
    Int64,
    /// Real values such as latencies.
    Float64,
}

#[derive(Debug, PartialEq)]
struct MeasureDescriptor {
    name: String,
    description: String,
    unit: Unit,
    kind: MeasureKind,
}

/// Handle to a declared measure. Cloning is cheap.
#[derive(Clone)]
pub struct Measure {
    desc: Arc<MeasureDescriptor>,
}

impl Measure {
    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn description(&self) -> &str {
        &self.desc.description
    }

    pub fn unit(&self) -> Unit {
        self.desc.unit
    }

    pub fn kind(&self) -> MeasureKind {
        self.desc.kind
    }

    /// An integer observation of this measure.
    pub fn int(&self, value: i64) -> Measurement {
        Measurement {
            measure: self.clone(),
            value: value as f64,
            kind: MeasureKind::Int64,
        }
    }

    /// A real-valued observation of this measure.
    pub fn float(&self, value: f64) -> Measurement {
        Measurement {
            measure: self.clone(),
            value,
            kind: MeasureKind::Float64,
        }
    }

    /// Whether both handles come from the same declaration.
    pub fn same_as(&self, other: &Measure) -> bool {
        Arc::ptr_eq(&self.desc, &other.desc)
    }
}

impl fmt::Debug for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Measure")
            .field("name", &self.desc.name)
            .field("unit", &self.desc.unit)
            .field("kind", &self.desc.kind)
            .finish()
    }
}

impl PartialEq for Measure {
    fn eq(&self, other: &Self) -> bool {
        self.desc == other.desc
    }
}

/// One observed value bound to its measure.
#[derive(Debug, Clone)]
pub struct Measurement {
    measure: Measure,
    value: f64,
    kind: MeasureKind,
}

impl Measurement {
    pub fn measure(&self) -> &Measure {
        &self.measure
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Kind of the value supplied by the producer.
    pub fn kind(&self) -> MeasureKind {
        self.kind
    }
}

/// Declares measures for one stats context.
#[derive(Debug, Default)]
pub struct MeasureRegistry {
    measures: DashMap<String, Measure>,
}

impl MeasureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a measure.
    ///
    /// Declaring the same name again with identical description, unit and kind
    /// returns the existing handle; any difference is a `DuplicateMeasure`.
    pub fn declare(
        &self,
        name: &str,
        description: &str,
        unit: Unit,
        kind: MeasureKind,
    ) -> StatsResult<Measure> {
        check_name(name).map_err(|reason| StatsError::InvalidMeasureName {
            name: name.to_string(),
            reason,
        })?;

        let desc = MeasureDescriptor {
            name: name.to_string(),
            description: description.to_string(),
            unit,
            kind,
        };

        match self.measures.entry(name.to_string()) {
            Entry::Occupied(existing) => {
                if *existing.get().desc == desc {
                    Ok(existing.get().clone())
                } else {
                    Err(StatsError::DuplicateMeasure(name.to_string()))
                }
            }
            Entry::Vacant(slot) => {
                let measure = Measure { desc: Arc::new(desc) };
                slot.insert(measure.clone());
                tracing::debug!(measure = name, unit = unit.symbol(), ?kind, "Measure declared");
                Ok(measure)
            }
        }
    }

    /// Look up a declared measure by name.
    pub fn get(&self, name: &str) -> Option<Measure> {
        self.measures.get(name).map(|r| r.value().clone())
    }

    /// Whether `measure` is the handle this registry handed out.
    pub fn contains(&self, measure: &Measure) -> bool {
        self.measures
            .get(measure.name())
            .map(|m| m.same_as(measure))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.measures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }
}
