use rusqlite::types::Value as SqliteValue;

use crate::types::Value;

/// Convert one bound value to its `SQLite` storage form.
///
/// `SQLite` has no boolean storage class, so `Boolean` is written as `0`/`1`.
#[must_use]
pub(crate) fn to_sqlite_value(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Integer(i) => SqliteValue::Integer(*i),
        Value::Real(f) => SqliteValue::Real(*f),
        Value::Text(s) => SqliteValue::Text(s.clone()),
        Value::Blob(b) => SqliteValue::Blob(b.clone()),
        Value::Boolean(b) => SqliteValue::Integer(i64::from(*b)),
    }
}

/// Positional parameter list ready for `Statement::query`.
pub(crate) struct Params(pub Vec<SqliteValue>);

impl Params {
    #[must_use]
    pub(crate) fn convert(params: &[Value]) -> Self {
        Params(params.iter().map(to_sqlite_value).collect())
    }

    pub(crate) fn as_params(&self) -> rusqlite::ParamsFromIter<std::slice::Iter<'_, SqliteValue>> {
        rusqlite::params_from_iter(self.0.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_become_integers() {
        assert_eq!(
            to_sqlite_value(&Value::Boolean(true)),
            SqliteValue::Integer(1)
        );
        assert_eq!(
            to_sqlite_value(&Value::Boolean(false)),
            SqliteValue::Integer(0)
        );
    }

    #[test]
    fn convert_keeps_order() {
        let params = Params::convert(&[
            Value::Text("a".into()),
            Value::Null,
            Value::Blob(vec![1, 2]),
        ]);
        assert_eq!(
            params.0,
            vec![
                SqliteValue::Text("a".into()),
                SqliteValue::Null,
                SqliteValue::Blob(vec![1, 2]),
            ]
        );
    }
}
