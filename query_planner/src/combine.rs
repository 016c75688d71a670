//! Combiner polymorphism: folds per-shard
//! aggregate partials into one cluster-wide result.
use crate::value::{AggregateValue, ColumnValue};
use std::fmt;

/// Whether a combiner can merge partials pairwise in any order (associative + commutative), or
/// needs to see shards in a fixed sequence (e.g. "last writer wins" style merges).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineMode {
    /// Partials may be folded two at a time in any order; the engine gathers them as they
    /// arrive rather than waiting for every shard.
    Associative,
    /// Partials must be folded in a caller-specified shard order.
    Ordered,
}

/// Merges the per-shard [`AggregateValue`]s produced by one aggregator into a single combined
/// value.
pub trait Combiner: fmt::Debug + Send + Sync {
    fn mode(&self) -> CombineMode;

    /// The identity element: `combine(zero(), x)` must yield (a value equivalent to) `x`. Seeds
    /// a cross-shard fold so it is well-defined even before any shard has reported.
    fn zero(&self) -> AggregateValue;

    /// Folds `next` into `acc`, replacing `acc`.
    fn combine(&self, acc: AggregateValue, next: AggregateValue) -> AggregateValue;

    /// Converts a fully-combined value into its final, client-facing shape. Most combiners are
    /// the identity here; `avg` uses it to turn a merged `(sum, count)` pair into a scalar mean.
    fn finish(&self, combined: AggregateValue) -> AggregateValue {
        combined
    }
}

#[derive(Debug)]
pub struct SumCombiner;

impl Combiner for SumCombiner {
    fn mode(&self) -> CombineMode {
        CombineMode::Associative
    }

    fn zero(&self) -> AggregateValue {
        AggregateValue::Scalar(ColumnValue::Double(0.0))
    }

    fn combine(&self, acc: AggregateValue, next: AggregateValue) -> AggregateValue {
        match (acc, next) {
            (AggregateValue::Scalar(a), AggregateValue::Scalar(b)) => {
                AggregateValue::Scalar(ColumnValue::Double(a.as_f64() + b.as_f64()))
            }
            (a, _) => a,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Min,
    Max,
}

#[derive(Debug)]
pub struct ExtremumCombiner(pub Extremum);

impl Combiner for ExtremumCombiner {
    fn mode(&self) -> CombineMode {
        CombineMode::Associative
    }

    fn zero(&self) -> AggregateValue {
        let v = match self.0 {
            Extremum::Min => f64::INFINITY,
            Extremum::Max => f64::NEG_INFINITY,
        };
        AggregateValue::Scalar(ColumnValue::Double(v))
    }

    fn combine(&self, acc: AggregateValue, next: AggregateValue) -> AggregateValue {
        match (acc, next) {
            (AggregateValue::Scalar(a), AggregateValue::Scalar(b)) => {
                let (a, b) = (a.as_f64(), b.as_f64());
                let winner = match self.0 {
                    Extremum::Min => a.min(b),
                    Extremum::Max => a.max(b),
                };
                AggregateValue::Scalar(ColumnValue::Double(winner))
            }
            (a, _) => a,
        }
    }
}

/// Merges `avg`'s unfinalized `(sum, count)` pairs exactly, then divides once at the very end —
/// never averages shard averages, which would over-weight low-cardinality shards.
#[derive(Debug)]
pub struct AvgCombiner;

impl Combiner for AvgCombiner {
    fn mode(&self) -> CombineMode {
        CombineMode::Associative
    }

    fn zero(&self) -> AggregateValue {
        AggregateValue::Pair(0.0, 0.0)
    }

    fn combine(&self, acc: AggregateValue, next: AggregateValue) -> AggregateValue {
        match (acc, next) {
            (AggregateValue::Pair(s1, c1), AggregateValue::Pair(s2, c2)) => {
                AggregateValue::Pair(s1 + s2, c1 + c2)
            }
            (a, _) => a,
        }
    }

    fn finish(&self, combined: AggregateValue) -> AggregateValue {
        match combined {
            AggregateValue::Pair(sum, count) if count > 0.0 => {
                AggregateValue::Scalar(ColumnValue::Double(sum / count))
            }
            AggregateValue::Pair(..) => AggregateValue::Scalar(ColumnValue::Double(f64::NAN)),
            other => other,
        }
    }
}

#[derive(Debug)]
pub struct HistogramSumCombiner {
    pub num_buckets: usize,
}

impl Combiner for HistogramSumCombiner {
    fn mode(&self) -> CombineMode {
        CombineMode::Associative
    }

    fn zero(&self) -> AggregateValue {
        // Matches `HistogramAggregator::new`'s linear bucket scheme: the two are always resolved
        // together for the same `num_buckets`, so the boundaries line up.
        AggregateValue::Histogram {
            counts: vec![0; self.num_buckets],
            bucket_max: (1..=self.num_buckets).map(|i| i as f64).collect(),
        }
    }

    fn combine(&self, acc: AggregateValue, next: AggregateValue) -> AggregateValue {
        match (acc, next) {
            (
                AggregateValue::Histogram {
                    counts: mut ca,
                    bucket_max,
                },
                AggregateValue::Histogram { counts: cb, .. },
            ) => {
                for (a, b) in ca.iter_mut().zip(cb.iter()) {
                    *a += b;
                }
                AggregateValue::Histogram {
                    counts: ca,
                    bucket_max,
                }
            }
            (a, _) => a,
        }
    }
}

/// Merges per-shard top-k lists by concatenating then keeping the overall top `k`.
///
/// Associative, but not commutative: ties at the k-th position are broken by which shard's value
/// was seen first, so shards must be folded in a fixed order for the surfaced k-th element to be
/// deterministic.
#[derive(Debug)]
pub struct TopKMergeCombiner {
    pub k: usize,
}

impl Combiner for TopKMergeCombiner {
    fn mode(&self) -> CombineMode {
        CombineMode::Ordered
    }

    fn zero(&self) -> AggregateValue {
        AggregateValue::Vector(Vec::new())
    }

    fn combine(&self, acc: AggregateValue, next: AggregateValue) -> AggregateValue {
        match (acc, next) {
            (AggregateValue::Vector(mut a), AggregateValue::Vector(b)) => {
                a.extend(b);
                a.sort_by(|x, y| {
                    y.as_f64()
                        .partial_cmp(&x.as_f64())
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                a.truncate(self.k);
                AggregateValue::Vector(a)
            }
            (a, _) => a,
        }
    }
}

/// Concatenates vectors shard by shard in the order they are combined; used by aggregators whose
/// result order is meaningful (e.g. a future ordered "sample" aggregator) and so must run in
/// [`CombineMode::Ordered`].
#[derive(Debug)]
pub struct ConcatCombiner;

impl Combiner for ConcatCombiner {
    fn mode(&self) -> CombineMode {
        CombineMode::Ordered
    }

    fn zero(&self) -> AggregateValue {
        AggregateValue::Vector(Vec::new())
    }

    fn combine(&self, acc: AggregateValue, next: AggregateValue) -> AggregateValue {
        match (acc, next) {
            (AggregateValue::Vector(mut a), AggregateValue::Vector(b)) => {
                a.extend(b);
                AggregateValue::Vector(a)
            }
            (a, _) => a,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_combiner_adds_scalars() {
        let c = SumCombiner;
        let acc = AggregateValue::Scalar(ColumnValue::Double(1.0));
        let next = AggregateValue::Scalar(ColumnValue::Double(2.0));
        assert_eq!(
            c.combine(acc, next),
            AggregateValue::Scalar(ColumnValue::Double(3.0))
        );
    }

    #[test]
    fn avg_combiner_merges_pairs_then_divides() {
        let c = AvgCombiner;
        let a = AggregateValue::Pair(10.0, 2.0);
        let b = AggregateValue::Pair(20.0, 3.0);
        let merged = c.combine(a, b);
        assert_eq!(merged, AggregateValue::Pair(30.0, 5.0));
        assert_eq!(
            c.finish(merged),
            AggregateValue::Scalar(ColumnValue::Double(6.0))
        );
    }

    #[test]
    fn avg_combiner_not_average_of_averages() {
        // Shard A: 1 sample of 100. Shard B: 99 samples of 0. True mean is 1.0, not 50.0.
        let c = AvgCombiner;
        let merged = c.combine(AggregateValue::Pair(100.0, 1.0), AggregateValue::Pair(0.0, 99.0));
        let AggregateValue::Scalar(ColumnValue::Double(mean)) = c.finish(merged) else {
            panic!("expected scalar");
        };
        assert!((mean - 1.0).abs() < 1e-9);
    }

    #[test]
    fn topk_merge_keeps_overall_largest() {
        let c = TopKMergeCombiner { k: 2 };
        let a = AggregateValue::Vector(vec![ColumnValue::Double(5.0), ColumnValue::Double(1.0)]);
        let b = AggregateValue::Vector(vec![ColumnValue::Double(9.0), ColumnValue::Double(2.0)]);
        assert_eq!(
            c.combine(a, b),
            AggregateValue::Vector(vec![ColumnValue::Double(9.0), ColumnValue::Double(5.0)])
        );
    }

    #[test]
    fn topk_merge_is_ordered_not_associative() {
        let c = TopKMergeCombiner { k: 2 };
        assert_eq!(c.mode(), CombineMode::Ordered);
    }

    #[test]
    fn zero_is_the_fold_identity() {
        let sum = SumCombiner;
        let x = AggregateValue::Scalar(ColumnValue::Double(4.0));
        assert_eq!(sum.combine(sum.zero(), x.clone()), x);

        let histogram = HistogramSumCombiner { num_buckets: 2 };
        let h = AggregateValue::Histogram {
            counts: vec![3, 5],
            bucket_max: vec![1.0, 2.0],
        };
        assert_eq!(histogram.combine(histogram.zero(), h.clone()), h);
    }
}
