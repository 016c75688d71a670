//! Aggregator polymorphism: a small capability set rather than a class hierarchy.
use crate::{
    error::QueryError,
    value::{AggregateValue, Cardinality, ColumnValue, ResultClass},
};
use data_types::ColumnType;
use std::fmt;

/// A literal argument passed to an aggregator or combiner function, e.g. the `numBuckets` in
/// `histogram(numBuckets)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i64),
    Str(String),
}

impl Arg {
    pub fn as_usize(&self) -> Result<usize, QueryError> {
        match self {
            Arg::Int(v) if *v >= 0 => Ok(*v as usize),
            Arg::Int(v) => Err(QueryError::BadArgument(format!(
                "expected a non-negative integer, got {v}"
            ))),
            Arg::Str(s) => Err(QueryError::BadArgument(format!(
                "expected an integer argument, got string {s:?}"
            ))),
        }
    }
}

/// The running fold state of one aggregator invocation, owned exclusively by one shard executor
/// invocation for the lifetime of one (queryId, shard) pair.
pub trait AggregatorState: fmt::Debug + Send {
    /// Folds one chunk's worth of column values into the running state.
    fn fold_chunk(&mut self, values: &[ColumnValue]);

    /// Whether this aggregator has seen enough and the scan can stop early. Defaults to `false`: most aggregators must see every row.
    fn is_done(&self) -> bool {
        false
    }

    /// Consumes the state, producing the (possibly still-partial, see `avg`) aggregate value.
    fn finalize(self: Box<Self>) -> AggregateValue;
}

/// The capability set an aggregator advertises: its output shape and a factory for fresh state.
pub trait Aggregator: fmt::Debug + Send + Sync {
    fn result_class(&self) -> ResultClass;
    fn cardinality(&self) -> Cardinality;

    /// Integer aggregators emit 32-bit unless `wide()`, in which case 64-bit.
    fn wide(&self) -> bool {
        false
    }

    fn zero(&self) -> AggregateValue;
    fn new_state(&self) -> Box<dyn AggregatorState>;
}

// ---- sum ----

#[derive(Debug)]
pub struct SumAggregator;

#[derive(Debug, Default)]
struct SumState {
    sum: f64,
}

impl AggregatorState for SumState {
    fn fold_chunk(&mut self, values: &[ColumnValue]) {
        for v in values {
            self.sum += v.as_f64();
        }
    }

    fn finalize(self: Box<Self>) -> AggregateValue {
        AggregateValue::Scalar(ColumnValue::Double(self.sum))
    }
}

impl Aggregator for SumAggregator {
    fn result_class(&self) -> ResultClass {
        ResultClass::Double
    }

    fn cardinality(&self) -> Cardinality {
        Cardinality::One
    }

    fn zero(&self) -> AggregateValue {
        AggregateValue::Scalar(ColumnValue::Double(0.0))
    }

    fn new_state(&self) -> Box<dyn AggregatorState> {
        Box::<SumState>::default()
    }
}

// ---- count ----

#[derive(Debug)]
pub struct CountAggregator;

#[derive(Debug, Default)]
struct CountState {
    count: i64,
}

impl AggregatorState for CountState {
    fn fold_chunk(&mut self, values: &[ColumnValue]) {
        self.count += values.len() as i64;
    }

    fn finalize(self: Box<Self>) -> AggregateValue {
        AggregateValue::Scalar(ColumnValue::Long(self.count))
    }
}

impl Aggregator for CountAggregator {
    fn result_class(&self) -> ResultClass {
        ResultClass::Long
    }

    fn cardinality(&self) -> Cardinality {
        Cardinality::One
    }

    fn wide(&self) -> bool {
        true
    }

    fn zero(&self) -> AggregateValue {
        AggregateValue::Scalar(ColumnValue::Long(0))
    }

    fn new_state(&self) -> Box<dyn AggregatorState> {
        Box::<CountState>::default()
    }
}

// ---- min / max ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Min,
    Max,
}

#[derive(Debug)]
pub struct ExtremumAggregator(pub Extremum);

#[derive(Debug)]
struct ExtremumState {
    kind: Extremum,
    value: Option<f64>,
}

impl AggregatorState for ExtremumState {
    fn fold_chunk(&mut self, values: &[ColumnValue]) {
        for v in values {
            let x = v.as_f64();
            self.value = Some(match self.value {
                None => x,
                Some(cur) => match self.kind {
                    Extremum::Min => cur.min(x),
                    Extremum::Max => cur.max(x),
                },
            });
        }
    }

    fn finalize(self: Box<Self>) -> AggregateValue {
        let default = match self.kind {
            Extremum::Min => f64::INFINITY,
            Extremum::Max => f64::NEG_INFINITY,
        };
        AggregateValue::Scalar(ColumnValue::Double(self.value.unwrap_or(default)))
    }
}

impl Aggregator for ExtremumAggregator {
    fn result_class(&self) -> ResultClass {
        ResultClass::Double
    }

    fn cardinality(&self) -> Cardinality {
        Cardinality::One
    }

    fn zero(&self) -> AggregateValue {
        let v = match self.0 {
            Extremum::Min => f64::INFINITY,
            Extremum::Max => f64::NEG_INFINITY,
        };
        AggregateValue::Scalar(ColumnValue::Double(v))
    }

    fn new_state(&self) -> Box<dyn AggregatorState> {
        Box::new(ExtremumState {
            kind: self.0,
            value: None,
        })
    }
}

// ---- avg ----

#[derive(Debug)]
pub struct AvgAggregator;

#[derive(Debug, Default)]
struct AvgState {
    sum: f64,
    count: f64,
}

impl AggregatorState for AvgState {
    fn fold_chunk(&mut self, values: &[ColumnValue]) {
        for v in values {
            self.sum += v.as_f64();
            self.count += 1.0;
        }
    }

    fn finalize(self: Box<Self>) -> AggregateValue {
        // Deliberately left unfinalized: the shard-local (sum, count) pair is merged by
        // `AvgCombiner`, which alone knows whether more shards' pairs are still coming.
        AggregateValue::Pair(self.sum, self.count)
    }
}

impl Aggregator for AvgAggregator {
    fn result_class(&self) -> ResultClass {
        ResultClass::Double
    }

    fn cardinality(&self) -> Cardinality {
        Cardinality::One
    }

    fn zero(&self) -> AggregateValue {
        AggregateValue::Pair(0.0, 0.0)
    }

    fn new_state(&self) -> Box<dyn AggregatorState> {
        Box::<AvgState>::default()
    }
}

// ---- last ----

#[derive(Debug)]
pub struct LastAggregator {
    pub column_type: ColumnType,
}

#[derive(Debug)]
struct LastState {
    value: Option<ColumnValue>,
}

impl AggregatorState for LastState {
    fn fold_chunk(&mut self, values: &[ColumnValue]) {
        if let Some(v) = values.last() {
            self.value = Some(v.clone());
        }
    }

    fn finalize(self: Box<Self>) -> AggregateValue {
        // `zero()` supplies the fallback if a partition produced no rows at all.
        AggregateValue::Scalar(self.value.unwrap_or(ColumnValue::Double(f64::NAN)))
    }
}

impl Aggregator for LastAggregator {
    fn result_class(&self) -> ResultClass {
        ResultClass::SameAsColumn(self.column_type)
    }

    fn cardinality(&self) -> Cardinality {
        Cardinality::One
    }

    fn zero(&self) -> AggregateValue {
        AggregateValue::Scalar(ColumnValue::Double(f64::NAN))
    }

    fn new_state(&self) -> Box<dyn AggregatorState> {
        Box::new(LastState { value: None })
    }
}

// ---- histogram ----

#[derive(Debug)]
pub struct HistogramAggregator {
    pub num_buckets: usize,
    pub bucket_max: Vec<f64>,
}

impl HistogramAggregator {
    pub fn new(num_buckets: usize) -> Self {
        // Linear bucket boundaries over [0, num_buckets); a real deployment would take
        // explicit boundaries, but this constructor only takes a bucket count.
        let bucket_max = (1..=num_buckets).map(|i| i as f64).collect();
        Self {
            num_buckets,
            bucket_max,
        }
    }
}

#[derive(Debug)]
struct HistogramState {
    counts: Vec<i64>,
    bucket_max: Vec<f64>,
}

impl AggregatorState for HistogramState {
    fn fold_chunk(&mut self, values: &[ColumnValue]) {
        for v in values {
            let x = v.as_f64();
            let bucket = self
                .bucket_max
                .iter()
                .position(|max| x <= *max)
                .unwrap_or(self.bucket_max.len() - 1);
            self.counts[bucket] += 1;
        }
    }

    fn finalize(self: Box<Self>) -> AggregateValue {
        AggregateValue::Histogram {
            counts: self.counts,
            bucket_max: self.bucket_max,
        }
    }
}

impl Aggregator for HistogramAggregator {
    fn result_class(&self) -> ResultClass {
        ResultClass::Histogram
    }

    fn cardinality(&self) -> Cardinality {
        Cardinality::N(self.num_buckets)
    }

    fn zero(&self) -> AggregateValue {
        AggregateValue::Histogram {
            counts: vec![0; self.num_buckets],
            bucket_max: self.bucket_max.clone(),
        }
    }

    fn new_state(&self) -> Box<dyn AggregatorState> {
        Box::new(HistogramState {
            counts: vec![0; self.num_buckets],
            bucket_max: self.bucket_max.clone(),
        })
    }
}

// ---- topk ----

#[derive(Debug)]
pub struct TopKAggregator {
    pub k: usize,
    pub column_type: ColumnType,
}

#[derive(Debug)]
struct TopKState {
    k: usize,
    values: Vec<ColumnValue>,
}

impl AggregatorState for TopKState {
    fn fold_chunk(&mut self, values: &[ColumnValue]) {
        self.values.extend(values.iter().cloned());
        self.values
            .sort_by(|a, b| b.as_f64().partial_cmp(&a.as_f64()).unwrap_or(std::cmp::Ordering::Equal));
        self.values.truncate(self.k);
    }

    fn is_done(&self) -> bool {
        // Once k values are held and they form a strictly decreasing frontier (no ties at the
        // boundary), no further row folded in can still displace any of them.
        self.values.len() >= self.k
            && self.values.windows(2).all(|w| w[0].as_f64() > w[1].as_f64())
    }

    fn finalize(self: Box<Self>) -> AggregateValue {
        AggregateValue::Vector(self.values)
    }
}

impl Aggregator for TopKAggregator {
    fn result_class(&self) -> ResultClass {
        ResultClass::SameAsColumn(self.column_type)
    }

    fn cardinality(&self) -> Cardinality {
        Cardinality::N(self.k)
    }

    fn zero(&self) -> AggregateValue {
        AggregateValue::Vector(Vec::new())
    }

    fn new_state(&self) -> Box<dyn AggregatorState> {
        Box::new(TopKState {
            k: self.k,
            values: Vec::with_capacity(self.k),
        })
    }
}
