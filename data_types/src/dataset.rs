//! The dataset/column data model.
use std::{collections::HashMap, fmt};
use thiserror::Error;

/// A stable identifier for a dataset, the key the [`crate::ShardMap`] and metastore use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetRef {
    /// The dataset's name, unique within `database`.
    pub name: String,
    /// An optional database/namespace tag; two datasets with the same `name` but different
    /// `database` are distinct.
    pub database: Option<String>,
}

impl DatasetRef {
    /// Creates a reference with no database tag.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: None,
        }
    }

    /// Creates a reference scoped to `database`.
    pub fn in_database(name: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: Some(database.into()),
        }
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.database {
            Some(db) => write!(f, "{db}/{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A stable, dense, small integer naming a column within one [`Dataset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(pub u32);

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The type of value stored in one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int,
    Long,
    Double,
    Timestamp,
    String,
    Histogram,
}

/// One column of a [`Dataset`]: a name, a type, and a dense small-int id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub id: ColumnId,
}

/// Errors building a [`Dataset`] from a raw column list.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatasetError {
    #[error("duplicate column id {0} (ids must be dense and unique)")]
    DuplicateColumnId(ColumnId),
    #[error("duplicate column name {0:?}")]
    DuplicateColumnName(String),
    #[error("column ids are not dense: expected 0..{expected}, found {found:?}")]
    NonDenseColumnIds { expected: u32, found: Vec<u32> },
    #[error("timestamp column {0:?} is not one of this dataset's columns")]
    UnknownTimestampColumn(String),
}

/// An immutable, validated dataset definition: an ordered column list, a partition-key spec, a
/// row-key spec, and an optional timestamp column.
///
/// Mutating a dataset's shape requires minting a new [`DatasetRef`]; there is no in-place
/// update here by design.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    dataset_ref: DatasetRef,
    columns: Vec<Column>,
    by_name: HashMap<String, ColumnId>,
    partition_key: String,
    row_key: String,
    timestamp_column: Option<ColumnId>,
}

impl Dataset {
    /// Builds a dataset, validating the column-id density/uniqueness invariant.
    pub fn new(
        dataset_ref: DatasetRef,
        columns: Vec<Column>,
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
        timestamp_column_name: Option<&str>,
    ) -> Result<Self, DatasetError> {
        let mut by_name = HashMap::with_capacity(columns.len());
        let mut seen_ids: Vec<u32> = Vec::with_capacity(columns.len());

        for col in &columns {
            if by_name.insert(col.name.clone(), col.id).is_some() {
                return Err(DatasetError::DuplicateColumnName(col.name.clone()));
            }
            if seen_ids.contains(&col.id.0) {
                return Err(DatasetError::DuplicateColumnId(col.id));
            }
            seen_ids.push(col.id.0);
        }

        seen_ids.sort_unstable();
        let expected: Vec<u32> = (0..columns.len() as u32).collect();
        if seen_ids != expected {
            return Err(DatasetError::NonDenseColumnIds {
                expected: columns.len() as u32,
                found: seen_ids,
            });
        }

        let timestamp_column = match timestamp_column_name {
            Some(name) => Some(
                *by_name
                    .get(name)
                    .ok_or_else(|| DatasetError::UnknownTimestampColumn(name.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            dataset_ref,
            columns,
            by_name,
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            timestamp_column,
        })
    }

    pub fn dataset_ref(&self) -> &DatasetRef {
        &self.dataset_ref
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn row_key(&self) -> &str {
        &self.row_key
    }

    pub fn timestamp_column(&self) -> Option<ColumnId> {
        self.timestamp_column
    }

    /// Resolves a column name to its id, or `None` if this dataset has no such column.
    pub fn column_id(&self, name: &str) -> Option<ColumnId> {
        self.by_name.get(name).copied()
    }

    /// Looks up a column by id. Ids are dense so this is an O(1) index into `columns`.
    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.get(id.0 as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, id: u32, t: ColumnType) -> Column {
        Column {
            name: name.to_string(),
            column_type: t,
            id: ColumnId(id),
        }
    }

    #[test]
    fn builds_valid_dataset() {
        let d = Dataset::new(
            DatasetRef::new("foo"),
            vec![
                col("t", 0, ColumnType::Timestamp),
                col("value", 1, ColumnType::Double),
            ],
            "partKey",
            "t",
            Some("t"),
        )
        .unwrap();
        assert_eq!(d.column_id("value"), Some(ColumnId(1)));
        assert_eq!(d.timestamp_column(), Some(ColumnId(0)));
        assert_eq!(d.column(ColumnId(1)).unwrap().name, "value");
    }

    #[test]
    fn rejects_duplicate_name() {
        let err = Dataset::new(
            DatasetRef::new("foo"),
            vec![
                col("value", 0, ColumnType::Double),
                col("value", 1, ColumnType::Double),
            ],
            "p",
            "t",
            None,
        )
        .unwrap_err();
        assert_eq!(err, DatasetError::DuplicateColumnName("value".to_string()));
    }

    #[test]
    fn rejects_non_dense_ids() {
        let err = Dataset::new(
            DatasetRef::new("foo"),
            vec![col("a", 0, ColumnType::Int), col("b", 5, ColumnType::Int)],
            "p",
            "t",
            None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            DatasetError::NonDenseColumnIds {
                expected: 2,
                found: vec![0, 5]
            }
        );
    }

    #[test]
    fn rejects_unknown_timestamp_column() {
        let err = Dataset::new(
            DatasetRef::new("foo"),
            vec![col("a", 0, ColumnType::Int)],
            "p",
            "t",
            Some("nope"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            DatasetError::UnknownTimestampColumn("nope".to_string())
        );
    }
}
