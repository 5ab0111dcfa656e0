use super::row::{Columns, Row};
use crate::types::Value;

/// A fully materialised query result
///
/// Produced by `fetch_all`; the streaming path hands out [`Row`]s one at a time
/// instead.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<Row>,
    /// Rows affected as reported by the backend, when it reports one
    pub rows_affected: Option<u64>,
    columns: Columns,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(columns: Columns, capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            rows_affected: None,
            columns,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    /// Add a row built from values in column order
    pub fn add_row_values(&mut self, row_values: Vec<Value>) {
        self.results.push(Row::new(self.columns.clone(), row_values));
    }

    pub fn add_row(&mut self, row: Row) {
        self.results.push(row);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Render every row as a JSON object, in order.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.results.iter().map(Row::to_json).collect())
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
