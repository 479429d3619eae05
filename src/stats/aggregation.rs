//! Aggregation definitions and their per-group state.
//!
//! # Responsibilities
//! - Describe how a stream of observations reduces to one statistic
//! - Provide the fixed latency and byte-size bucket boundaries
//! - Fold observations into per-group aggregate state
//!
//! # Design Decisions
//! - Aggregations are plain values; the state lives in [`AggregationData`]
//! - Distribution buckets are closed-open `[b_i, b_i+1)` with an underflow
//!   bucket below the first bound and an overflow bucket from the last bound up

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::{StatsError, StatsResult};

/// Latency boundaries in milliseconds, fine below one second and coarse in the tail.
pub const LATENCY_BOUNDS: &[f64] = &[
    0.0, 0.01, 0.05, 0.1, 0.3, 0.6, 0.8, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 13.0, 16.0, 20.0,
    25.0, 30.0, 40.0, 50.0, 65.0, 80.0, 100.0, 130.0, 160.0, 200.0, 250.0, 300.0, 400.0, 500.0,
    650.0, 800.0, 1000.0, 2000.0, 5000.0, 10000.0, 20000.0, 50000.0, 100000.0,
];

/// Byte-size boundaries, from small messages up to 1 MiB.
pub const BYTES_BOUNDS: &[f64] = &[
    0.0, 24.0, 32.0, 64.0, 128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0, 16384.0, 65536.0,
    262144.0, 1048576.0,
];

/// How observations within one tag tuple are reduced.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Number of observations.
    Count,
    /// Running total of observed values.
    Sum,
    /// Histogram over fixed boundaries.
    Distribution(Bounds),
}

impl Aggregation {
    /// Distribution over caller-supplied boundaries.
    pub fn distribution(bounds: &[f64]) -> StatsResult<Self> {
        Bounds::new(bounds).map(Aggregation::Distribution)
    }

    /// Distribution over [`LATENCY_BOUNDS`].
    pub fn latency() -> Self {
        Aggregation::Distribution(Bounds::trusted(LATENCY_BOUNDS))
    }

    /// Distribution over [`BYTES_BOUNDS`].
    pub fn bytes() -> Self {
        Aggregation::Distribution(Bounds::trusted(BYTES_BOUNDS))
    }

    pub fn kind(&self) -> AggregationKind {
        match self {
            Aggregation::Count => AggregationKind::Count,
            Aggregation::Sum => AggregationKind::Sum,
            Aggregation::Distribution(_) => AggregationKind::Distribution,
        }
    }

    /// Fresh state for a newly seen tag tuple.
    pub(crate) fn new_data(&self) -> AggregationData {
        match self {
            Aggregation::Count => AggregationData::Count(0),
            Aggregation::Sum => AggregationData::Sum(0.0),
            Aggregation::Distribution(bounds) => {
                AggregationData::Distribution(DistributionData::new(bounds.clone()))
            }
        }
    }
}

/// Aggregation kind without parameters, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    Count,
    Sum,
    Distribution,
}

/// Validated, strictly ascending, non-negative bucket boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds(Arc<[f64]>);

impl Bounds {
    pub fn new(bounds: &[f64]) -> StatsResult<Self> {
        if bounds.is_empty() {
            return Err(StatsError::InvalidBounds("no boundaries given".into()));
        }
        if let Some(b) = bounds.iter().find(|b| !b.is_finite() || **b < 0.0) {
            return Err(StatsError::InvalidBounds(format!(
                "boundary {b} is negative or not finite"
            )));
        }
        if let Some(pair) = bounds.windows(2).find(|w| w[0] >= w[1]) {
            return Err(StatsError::InvalidBounds(format!(
                "boundaries must be strictly ascending, found {} before {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self(bounds.into()))
    }

    /// For the crate's own constants, which are checked in tests.
    fn trusted(bounds: &[f64]) -> Self {
        Self(bounds.into())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Index into the bucket counts for `value`.
    ///
    /// 0 is the underflow bucket, `i + 1` holds `[b_i, b_i+1)`, and the last
    /// index holds everything at or above the final boundary.
    pub fn bucket_index(&self, value: f64) -> usize {
        self.0.partition_point(|b| *b <= value)
    }
}

/// Aggregate state for one tag tuple.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AggregationData {
    Count(u64),
    Sum(f64),
    Distribution(DistributionData),
}

impl AggregationData {
    /// Fold one observation into this state.
    pub(crate) fn add_sample(&mut self, value: f64) {
        match self {
            AggregationData::Count(n) => *n += 1,
            AggregationData::Sum(total) => *total += value,
            AggregationData::Distribution(dist) => dist.add_sample(value),
        }
    }
}

/// Histogram plus summary statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionData {
    pub count: u64,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub sum_of_squared_dev: f64,
    /// Boundaries the counts refer to.
    #[serde(serialize_with = "serialize_bounds")]
    pub bounds: Bounds,
    /// `bounds.len() + 1` counts: underflow, one per boundary.
    pub bucket_counts: Vec<u64>,
}

fn serialize_bounds<S: serde::Serializer>(bounds: &Bounds, s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(bounds.as_slice())
}

impl DistributionData {
    fn new(bounds: Bounds) -> Self {
        let buckets = bounds.as_slice().len() + 1;
        Self {
            count: 0,
            sum: 0.0,
            mean: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum_of_squared_dev: 0.0,
            bounds,
            bucket_counts: vec![0; buckets],
        }
    }

    fn add_sample(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count += 1;
        self.sum += value;

        // Welford's running variance
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.sum_of_squared_dev += delta * (value - self.mean);

        let idx = self.bounds.bucket_index(value);
        self.bucket_counts[idx] += 1;
    }

    /// Sample variance, 0 with fewer than two observations.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.sum_of_squared_dev / (self.count - 1) as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_bounds_are_valid() {
        assert!(Bounds::new(LATENCY_BOUNDS).is_ok());
        assert!(Bounds::new(BYTES_BOUNDS).is_ok());
        assert_eq!(LATENCY_BOUNDS.first(), Some(&0.0));
        assert_eq!(LATENCY_BOUNDS.last(), Some(&100000.0));
        assert_eq!(BYTES_BOUNDS.last(), Some(&1048576.0));
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(matches!(Aggregation::distribution(&[]), Err(StatsError::InvalidBounds(_))));
        assert!(Aggregation::distribution(&[1.0, 1.0]).is_err());
        assert!(Aggregation::distribution(&[2.0, 1.0]).is_err());
        assert!(Aggregation::distribution(&[-1.0, 1.0]).is_err());
        assert!(Aggregation::distribution(&[0.0, f64::NAN]).is_err());
        assert!(Aggregation::distribution(&[0.0, f64::INFINITY]).is_err());
        assert!(Aggregation::distribution(&[0.0, 5.0, 10.0]).is_ok());
    }

    #[test]
    fn test_bucket_boundaries_are_closed_open() {
        let bounds = Bounds::new(&[1.0, 5.0, 10.0]).unwrap();
        assert_eq!(bounds.bucket_index(0.5), 0); // underflow
        assert_eq!(bounds.bucket_index(1.0), 1); // [1, 5)
        assert_eq!(bounds.bucket_index(4.999), 1);
        assert_eq!(bounds.bucket_index(5.0), 2); // [5, 10)
        assert_eq!(bounds.bucket_index(10.0), 3); // overflow
        assert_eq!(bounds.bucket_index(1e12), 3);
    }

    #[test]
    fn test_every_latency_boundary_starts_its_bucket() {
        let agg = Aggregation::latency();
        for (i, b) in LATENCY_BOUNDS.iter().enumerate() {
            let mut data = agg.new_data();
            data.add_sample(*b);
            let AggregationData::Distribution(dist) = data else {
                panic!("expected distribution");
            };
            assert_eq!(dist.bucket_counts[i + 1], 1, "boundary {b}");
            assert_eq!(dist.bucket_counts.iter().sum::<u64>(), 1);
        }
    }

    #[test]
    fn test_overflow_is_not_dropped() {
        let mut data = Aggregation::bytes().new_data();
        data.add_sample(10_000_000.0);
        let AggregationData::Distribution(dist) = data else {
            panic!("expected distribution");
        };
        assert_eq!(dist.bucket_counts.len(), BYTES_BOUNDS.len() + 1);
        assert_eq!(*dist.bucket_counts.last().unwrap(), 1);
        assert_eq!(dist.count, 1);
    }

    #[test]
    fn test_sum_and_count() {
        let mut sum = Aggregation::Sum.new_data();
        let mut count = Aggregation::Count.new_data();
        for v in [1.0, 1.0, -1.0, 1.0] {
            sum.add_sample(v);
            count.add_sample(v);
        }
        assert_eq!(sum, AggregationData::Sum(2.0));
        assert_eq!(count, AggregationData::Count(4));
    }

    #[test]
    fn test_distribution_statistics() {
        let mut data = Aggregation::distribution(&[0.0, 10.0]).unwrap().new_data();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            data.add_sample(v);
        }
        let AggregationData::Distribution(dist) = data else {
            panic!("expected distribution");
        };
        assert_eq!(dist.count, 8);
        assert_eq!(dist.sum, 40.0);
        assert!((dist.mean - 5.0).abs() < 1e-9);
        assert_eq!(dist.min, 2.0);
        assert_eq!(dist.max, 9.0);
        assert!((dist.sum_of_squared_dev - 32.0).abs() < 1e-9);
        assert!((dist.variance() - 32.0 / 7.0).abs() < 1e-9);
        assert_eq!(dist.bucket_counts, vec![0, 8, 0]);
    }
}
