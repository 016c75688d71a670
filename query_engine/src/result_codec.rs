//! `ResultCodec`: packs an [`EngineOutput`] into the client-facing `Result` wire shape.
use data_types::ColumnType;
use observability_deps::tracing::warn;
use query_planner::{AggregateValue, Cardinality, ColumnValue, ResultClass};

/// A `(name, ColumnType)` pair describing one field of a [`QueryResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub column_type: ColumnType,
}

/// The wire form of a query's result.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// A single-row result: one named column, one value.
    Tuple {
        schema: Vec<FieldSchema>,
        values: Vec<ColumnValue>,
    },
    /// A multi-row/multi-column result: one or more typed column vectors of equal length.
    Vector {
        schema: Vec<FieldSchema>,
        columns: Vec<Vec<ColumnValue>>,
    },
}

/// Encodes an [`EngineOutput`] plus the aggregator's advertised shape into a [`QueryResult`].
#[derive(Debug, Default)]
pub struct ResultCodec;

impl ResultCodec {
    pub fn new() -> Self {
        Self
    }

    /// Packs rows from `DistributeConcat`'s row-shaped templates: each row already has one
    /// value per requested column.
    pub fn encode_rows(&self, column_names: &[String], rows: Vec<Vec<ColumnValue>>) -> QueryResult {
        let schema = infer_schema(column_names, &rows);
        QueryResult::Vector {
            schema,
            columns: transpose(rows, column_names.len()),
        }
    }

    /// Packs one aggregate value per the result-class table.
    pub fn encode_aggregate(
        &self,
        result_class: ResultClass,
        cardinality: Cardinality,
        value: AggregateValue,
    ) -> QueryResult {
        match (cardinality, value) {
            (Cardinality::One, AggregateValue::Scalar(v)) => QueryResult::Tuple {
                schema: vec![FieldSchema {
                    name: "result".into(),
                    column_type: result_column_type(result_class),
                }],
                values: vec![v],
            },
            (Cardinality::N(_), AggregateValue::Vector(values)) => QueryResult::Vector {
                schema: vec![FieldSchema {
                    name: "result".into(),
                    column_type: result_column_type(result_class),
                }],
                columns: vec![values],
            },
            (Cardinality::N(_), AggregateValue::Histogram { counts, bucket_max }) => {
                QueryResult::Vector {
                    schema: vec![
                        FieldSchema {
                            name: "counts".into(),
                            column_type: ColumnType::Long,
                        },
                        FieldSchema {
                            name: "bucketMax".into(),
                            column_type: ColumnType::Double,
                        },
                    ],
                    columns: vec![
                        counts.into_iter().map(ColumnValue::Long).collect(),
                        bucket_max.into_iter().map(ColumnValue::Double).collect(),
                    ],
                }
            }
            (_, other) => {
                // `avg`'s Pair should never reach the codec unfinished; a combiner's `finish()`
                // always converts it first. Surface it as a NaN scalar rather than panicking.
                warn!(?other, "aggregate reached ResultCodec in an unfinished shape");
                QueryResult::Tuple {
                    schema: vec![FieldSchema {
                        name: "result".into(),
                        column_type: ColumnType::Double,
                    }],
                    values: vec![ColumnValue::Double(f64::NAN)],
                }
            }
        }
    }

    /// Best-effort self-check: attempts to round-trip `result`
    /// and logs, but never fails the client response.
    pub fn maybe_self_check(&self, enabled: bool, result: &QueryResult) {
        if !enabled {
            return;
        }
        if let Err(reason) = self_check(result) {
            warn!(%reason, "result serialization self-check failed");
        }
    }
}

fn result_column_type(result_class: ResultClass) -> ColumnType {
    match result_class {
        ResultClass::Int => ColumnType::Int,
        ResultClass::Long => ColumnType::Long,
        ResultClass::Double => ColumnType::Double,
        ResultClass::SameAsColumn(t) => t,
        ResultClass::Histogram => ColumnType::Histogram,
    }
}

fn infer_schema(column_names: &[String], rows: &[Vec<ColumnValue>]) -> Vec<FieldSchema> {
    let first_row = rows.first();
    column_names
        .iter()
        .enumerate()
        .map(|(i, name)| FieldSchema {
            name: name.clone(),
            column_type: first_row
                .and_then(|row| row.get(i))
                .map(ColumnValue::column_type)
                .unwrap_or(ColumnType::Double),
        })
        .collect()
}

fn transpose(rows: Vec<Vec<ColumnValue>>, num_columns: usize) -> Vec<Vec<ColumnValue>> {
    let mut columns: Vec<Vec<ColumnValue>> = vec![Vec::with_capacity(rows.len()); num_columns];
    for row in rows {
        for (i, value) in row.into_iter().enumerate() {
            if let Some(col) = columns.get_mut(i) {
                col.push(value);
            }
        }
    }
    columns
}

fn self_check(result: &QueryResult) -> Result<(), String> {
    match result {
        QueryResult::Tuple { schema, values } if schema.len() != values.len() => Err(format!(
            "tuple schema has {} fields but {} values",
            schema.len(),
            values.len()
        )),
        QueryResult::Vector { schema, columns } if schema.len() != columns.len() => Err(format!(
            "vector schema has {} fields but {} columns",
            schema.len(),
            columns.len()
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_scalar_aggregate_as_tuple() {
        let codec = ResultCodec::new();
        let result = codec.encode_aggregate(
            ResultClass::Double,
            Cardinality::One,
            AggregateValue::Scalar(ColumnValue::Double(15.0)),
        );
        match result {
            QueryResult::Tuple { schema, values } => {
                assert_eq!(schema.len(), 1);
                assert_eq!(values, vec![ColumnValue::Double(15.0)]);
            }
            _ => panic!("expected tuple"),
        }
    }

    #[test]
    fn encodes_histogram_as_parallel_vectors() {
        let codec = ResultCodec::new();
        let result = codec.encode_aggregate(
            ResultClass::Histogram,
            Cardinality::N(2),
            AggregateValue::Histogram {
                counts: vec![3, 7],
                bucket_max: vec![1.0, 2.0],
            },
        );
        match result {
            QueryResult::Vector { schema, columns } => {
                assert_eq!(schema.len(), 2);
                assert_eq!(columns[0], vec![ColumnValue::Long(3), ColumnValue::Long(7)]);
            }
            _ => panic!("expected vector"),
        }
    }

    #[test]
    fn preserves_nan_and_infinity() {
        let codec = ResultCodec::new();
        let result = codec.encode_aggregate(
            ResultClass::Double,
            Cardinality::One,
            AggregateValue::Scalar(ColumnValue::Double(f64::INFINITY)),
        );
        match result {
            QueryResult::Tuple { values, .. } => match values[0] {
                ColumnValue::Double(v) => assert!(v.is_infinite()),
                _ => panic!("expected double"),
            },
            _ => panic!("expected tuple"),
        }
    }

    #[test]
    fn encode_rows_transposes_into_columns() {
        let codec = ResultCodec::new();
        let rows = vec![
            vec![ColumnValue::Double(1.0), ColumnValue::Int(10)],
            vec![ColumnValue::Double(2.0), ColumnValue::Int(20)],
        ];
        let result = codec.encode_rows(&["value".to_string(), "count".to_string()], rows);
        match result {
            QueryResult::Vector { columns, .. } => {
                assert_eq!(
                    columns[0],
                    vec![ColumnValue::Double(1.0), ColumnValue::Double(2.0)]
                );
                assert_eq!(columns[1], vec![ColumnValue::Int(10), ColumnValue::Int(20)]);
            }
            _ => panic!("expected vector"),
        }
    }
}
