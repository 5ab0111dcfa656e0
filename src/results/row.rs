use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Map;

use crate::exchange::ValueExchange;
use crate::types::Value;

/// Column names of a result, shared by every row produced from the same statement.
#[derive(Debug, Clone, Default)]
pub struct Columns {
    names: Arc<Vec<String>>,
    // first position wins when a name repeats (`SELECT a, a FROM t`)
    index: Arc<HashMap<String, usize>>,
}

impl Columns {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self {
            names: Arc::new(names),
            index: Arc::new(index),
        }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn position(&self, column_name: &str) -> Option<usize> {
        self.index.get(column_name).copied()
    }
}

/// A row from a query result
///
/// Ordered `(column name, Value)` pairs. Rows are owned copies: the native row the
/// driver read them from is gone by the time the caller sees them.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Columns,
    values: Vec<Value>,
}

impl Row {
    /// Create a new row
    ///
    /// # Arguments
    ///
    /// * `columns` - Shared column names
    /// * `values` - The values for this row, in column order
    #[must_use]
    pub fn new(columns: Columns, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Get a value from the row by column name
    ///
    /// # Returns
    ///
    /// The value at the column, or None if the column wasn't found
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&Value> {
        self.columns
            .position(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(column name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Render the row as a JSON object keyed by column name.
    ///
    /// Repeated column names keep the last value, as a host dict would.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = Map::with_capacity(self.values.len());
        for (name, value) in self.iter() {
            map.insert(name.to_owned(), serde_json::Value::from_value(value.clone()));
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_and_index() {
        let columns = Columns::new(vec!["a".into(), "b".into(), "a".into()]);
        let row = Row::new(
            columns,
            vec![Value::Integer(1), Value::Text("x".into()), Value::Integer(3)],
        );
        assert_eq!(row.get("a"), Some(&Value::Integer(1)));
        assert_eq!(row.get("b"), Some(&Value::Text("x".into())));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get_by_index(2), Some(&Value::Integer(3)));
        assert_eq!(row.iter().count(), 3);
    }

    #[test]
    fn json_rendering() {
        let row = Row::new(
            Columns::new(vec!["id".into(), "flag".into()]),
            vec![Value::Integer(9), Value::Boolean(false)],
        );
        assert_eq!(row.to_json(), serde_json::json!({"id": 9, "flag": false}));
    }
}
