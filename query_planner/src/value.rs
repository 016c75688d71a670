//! Runtime value and result-shape types that flow between the column store, the aggregator
//! pipeline, and the `ResultCodec`.
use data_types::ColumnType;

/// One column value as read from a chunk. `Timestamp` is milliseconds since the epoch.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Int(i32),
    Long(i64),
    Double(f64),
    Timestamp(i64),
    Str(String),
}

impl ColumnValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::Long(v) => *v as f64,
            Self::Double(v) => *v,
            Self::Timestamp(v) => *v as f64,
            Self::Str(_) => f64::NAN,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Int(_) => ColumnType::Int,
            Self::Long(_) => ColumnType::Long,
            Self::Double(_) => ColumnType::Double,
            Self::Timestamp(_) => ColumnType::Timestamp,
            Self::Str(_) => ColumnType::String,
        }
    }
}

/// The class of value an aggregator/combiner produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultClass {
    Int,
    Long,
    Double,
    /// The result class matches whichever column type the aggregator was built against (e.g.
    /// `last`, `topk`).
    SameAsColumn(ColumnType),
    Histogram,
}

/// Whether an aggregator produces one value or a fixed-size vector of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    N(usize),
}

impl Cardinality {
    pub fn len(self) -> usize {
        match self {
            Cardinality::One => 1,
            Cardinality::N(n) => n,
        }
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

/// The per-shard partial result of an aggregator, or the folded result of a combiner.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateValue {
    Scalar(ColumnValue),
    Vector(Vec<ColumnValue>),
    Histogram {
        counts: Vec<i64>,
        bucket_max: Vec<f64>,
    },
    /// An unfinalized (sum, count) pair, used internally by `avg`: per-shard partials carry the
    /// raw pair so the combiner merges exact sums/counts instead of averaging averages, and
    /// `Combiner::finish` converts the fully-merged pair into a `Scalar`.
    Pair(f64, f64),
}

impl AggregateValue {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            Self::Scalar(_) | Self::Pair(..) => Cardinality::One,
            Self::Vector(v) => Cardinality::N(v.len()),
            Self::Histogram { counts, .. } => Cardinality::N(counts.len()),
        }
    }
}
