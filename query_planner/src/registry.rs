//! Name -> factory resolution for the built-in aggregator and combiner set.
use crate::{
    aggregate::{
        Aggregator, AvgAggregator, CountAggregator, Extremum as AggExtremum, ExtremumAggregator,
        HistogramAggregator, LastAggregator, SumAggregator, TopKAggregator,
    },
    combine::{
        AvgCombiner, Combiner, ConcatCombiner, Extremum as CombExtremum, ExtremumCombiner,
        HistogramSumCombiner, SumCombiner, TopKMergeCombiner,
    },
    aggregate::Arg,
    error::QueryError,
};
use data_types::ColumnType;
use observability_deps::tracing::warn;

/// Resolves a function name (as it appears in a query, matched case-insensitively per
/// [`crate::validator::Validator`]) plus its literal arguments into a concrete
/// [`Aggregator`]/[`Combiner`] pair.
///
/// The aggregator's shard-local output and the combiner that merges it across shards are always
/// chosen together: picking one without the other would let a client request, say, `sum`'s
/// aggregator combined via `topk_merge`, which cannot type-check against a real result shape.
#[derive(Debug, Default)]
pub struct FunctionRegistry;

/// One resolved `(aggregator, combiner)` pair, ready to be embedded in a physical plan.
pub struct ResolvedFunction {
    pub aggregator: Box<dyn Aggregator>,
    pub combiner: Box<dyn Combiner>,
}

impl FunctionRegistry {
    pub fn resolve(
        &self,
        name: &str,
        args: &[Arg],
        column_type: ColumnType,
    ) -> Result<ResolvedFunction, QueryError> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "sum" => {
                expect_arity(&lower, args, 0)?;
                Ok(ResolvedFunction {
                    aggregator: Box::new(SumAggregator),
                    combiner: Box::new(SumCombiner),
                })
            }
            "count" => {
                expect_arity(&lower, args, 0)?;
                Ok(ResolvedFunction {
                    aggregator: Box::new(CountAggregator),
                    combiner: Box::new(SumCombiner),
                })
            }
            "min" => {
                expect_arity(&lower, args, 0)?;
                Ok(ResolvedFunction {
                    aggregator: Box::new(ExtremumAggregator(AggExtremum::Min)),
                    combiner: Box::new(ExtremumCombiner(CombExtremum::Min)),
                })
            }
            "max" => {
                expect_arity(&lower, args, 0)?;
                Ok(ResolvedFunction {
                    aggregator: Box::new(ExtremumAggregator(AggExtremum::Max)),
                    combiner: Box::new(ExtremumCombiner(CombExtremum::Max)),
                })
            }
            "avg" => {
                expect_arity(&lower, args, 0)?;
                Ok(ResolvedFunction {
                    aggregator: Box::new(AvgAggregator),
                    combiner: Box::new(AvgCombiner),
                })
            }
            "last" => {
                expect_arity(&lower, args, 0)?;
                Ok(ResolvedFunction {
                    aggregator: Box::new(LastAggregator { column_type }),
                    combiner: Box::new(ConcatCombiner),
                })
            }
            "histogram" => {
                expect_arity(&lower, args, 1)?;
                let num_buckets = args[0].as_usize()?;
                if num_buckets == 0 {
                    return Err(QueryError::BadArgument(
                        "histogram requires numBuckets >= 1".into(),
                    ));
                }
                Ok(ResolvedFunction {
                    aggregator: Box::new(HistogramAggregator::new(num_buckets)),
                    combiner: Box::new(HistogramSumCombiner { num_buckets }),
                })
            }
            "topk" => {
                expect_arity(&lower, args, 1)?;
                let k = args[0].as_usize()?;
                if k == 0 {
                    return Err(QueryError::BadArgument("topk requires k >= 1".into()));
                }
                Ok(ResolvedFunction {
                    aggregator: Box::new(TopKAggregator { k, column_type }),
                    combiner: Box::new(TopKMergeCombiner { k }),
                })
            }
            _ => {
                warn!(function = name, "no such aggregation/combiner function");
                Err(QueryError::NoSuchFunction(name.to_string()))
            }
        }
    }
}

fn expect_arity(name: &str, args: &[Arg], expected: usize) -> Result<(), QueryError> {
    if args.len() != expected {
        return Err(QueryError::WrongArity {
            given: args.len(),
            expected,
        });
    }
    let _ = name;
    Ok(())
}
