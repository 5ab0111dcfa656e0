use rusqlite::types::{Type, ValueRef};
use rusqlite::{Connection, Statement};

use crate::driver::{ColumnTyping, PreparedMeta};
use crate::types::Value;

/// What the worker needs to turn native rows of one statement into `Value`s.
#[derive(Debug, Clone)]
pub(crate) struct ColumnPlan {
    /// Columns declared with a type containing `BOOL`; integers read from them become `Boolean`.
    boolean: Vec<bool>,
    readonly: bool,
}

impl ColumnPlan {
    /// Inspect a freshly compiled statement.
    pub(crate) fn inspect(stmt: &Statement<'_>) -> (Self, PreparedMeta) {
        let columns = stmt.columns();
        let column_names = columns.iter().map(|c| c.name().to_string()).collect();
        let column_types: Vec<Option<String>> = columns
            .iter()
            .map(|c| c.decl_type().map(str::to_string))
            .collect();
        let boolean = column_types
            .iter()
            .map(|decl| {
                decl.as_deref()
                    .is_some_and(|d| d.to_ascii_uppercase().contains("BOOL"))
            })
            .collect();

        let plan = ColumnPlan {
            boolean,
            readonly: stmt.readonly(),
        };
        let meta = PreparedMeta {
            column_names,
            column_types,
            parameter_count: stmt.parameter_count(),
            typing: ColumnTyping::PerRow,
        };
        (plan, meta)
    }

    /// Read every column of the current row. The tag follows each cell's storage class.
    ///
    /// # Errors
    /// Propagates `rusqlite` errors from reading a column, and fails with
    /// `FromSqlConversionFailure` naming the column when a TEXT cell is not valid UTF-8.
    pub(crate) fn extract(&self, row: &rusqlite::Row<'_>) -> Result<Vec<Value>, rusqlite::Error> {
        let mut values = Vec::with_capacity(self.boolean.len());
        for (idx, is_bool) in self.boolean.iter().enumerate() {
            values.push(convert(idx, row.get_ref(idx)?, *is_bool)?);
        }
        Ok(values)
    }

    /// Rows changed by the statement that just completed, `None` for read-only statements.
    pub(crate) fn rows_affected(&self, conn: &Connection) -> Option<u64> {
        if self.readonly {
            None
        } else {
            #[allow(clippy::useless_conversion)]
            let changed = u64::try_from(conn.changes()).ok();
            changed
        }
    }
}

fn convert(idx: usize, cell: ValueRef<'_>, is_bool: bool) -> Result<Value, rusqlite::Error> {
    let value = match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if is_bool => Value::Boolean(i != 0),
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => Value::Text(text.to_string()),
            Err(e) => {
                return Err(rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    Type::Text,
                    Box::new(e),
                ));
            }
        },
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_class_decides_the_tag() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (a, flag BOOLEAN);
             INSERT INTO t VALUES (1, 1), ('one', 0), (1.5, 'yes'), (x'00ff', NULL);",
        )
        .unwrap();

        let mut stmt = conn.prepare("SELECT a, flag FROM t ORDER BY rowid").unwrap();
        let (plan, meta) = ColumnPlan::inspect(&stmt);
        assert_eq!(meta.column_names, vec!["a", "flag"]);
        assert_eq!(meta.column_types, vec![None, Some("BOOLEAN".to_string())]);
        assert_eq!(meta.typing, ColumnTyping::PerRow);
        assert_eq!(meta.parameter_count, 0);
        assert_eq!(plan.rows_affected(&conn), None);

        let mut rows = stmt.query([]).unwrap();
        let mut out = Vec::new();
        while let Some(row) = rows.next().unwrap() {
            out.push(plan.extract(row).unwrap());
        }
        assert_eq!(
            out,
            vec![
                vec![Value::Integer(1), Value::Boolean(true)],
                vec![Value::Text("one".into()), Value::Boolean(false)],
                vec![Value::Real(1.5), Value::Text("yes".into())],
                vec![Value::Blob(vec![0x00, 0xff]), Value::Null],
            ]
        );
    }

    #[test]
    fn writes_report_changes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (a INTEGER)").unwrap();
        let mut stmt = conn.prepare("INSERT INTO t VALUES (?1), (?2)").unwrap();
        let (plan, meta) = ColumnPlan::inspect(&stmt);
        assert_eq!(meta.parameter_count, 2);
        stmt.execute([1, 2]).unwrap();
        assert_eq!(plan.rows_affected(&conn), Some(2));
    }

    #[test]
    fn invalid_utf8_text_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT 'ok', CAST(x'ff' AS TEXT)").unwrap();
        let (plan, _) = ColumnPlan::inspect(&stmt);
        let mut rows = stmt.query([]).unwrap();
        let row = rows.next().unwrap().unwrap();
        match plan.extract(row) {
            Err(rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, _)) => assert_eq!(idx, 1),
            other => panic!("expected a conversion failure, got {other:?}"),
        }
    }
}
