#![cfg(feature = "test-utils")]

use sql_bridge::prelude::*;
use sql_bridge::test_utils::{setup_postgres_embedded, stop_postgres_embedded};

#[test]
fn postgres_cursor_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let server = setup_postgres_embedded("bridge_cursor")?;
    let result = exercise(&server.options);
    stop_postgres_embedded(server);
    result
}

fn exercise(options: &NetworkedOptions) -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(options.clone().with_fetch_size(2))?;
    assert_eq!(conn.kind(), BackendKind::Networked);

    conn.execute_batch(
        "CREATE TABLE all_kinds (
             id BIGINT PRIMARY KEY,
             n TEXT,
             r DOUBLE PRECISION,
             s TEXT,
             b BYTEA,
             f BOOLEAN
         );",
    )?;

    // Six tags survive a round trip.
    let inserted = vec![
        Value::Integer(1),
        Value::Null,
        Value::Real(-0.25),
        Value::Text("héllo".into()),
        Value::Blob(vec![0, 159, 255]),
        Value::Boolean(true),
    ];
    let stmt = conn.execute(
        "INSERT INTO all_kinds VALUES ($1, $2, $3, $4, $5, $6)",
        &inserted,
    )?;
    assert_eq!(stmt.rows_affected(), Some(1));
    drop(stmt);

    let mut stmt = conn.prepare("SELECT id, n, r, s, b, f FROM all_kinds")?;
    assert_eq!(stmt.column_typing(), ColumnTyping::PerStatement);
    assert_eq!(stmt.column_types()[0].as_deref(), Some("int8"));
    let row = stmt.advance()?.ok_or("expected the inserted row")?;
    assert_eq!(row.values(), inserted.as_slice());
    assert!(stmt.advance()?.is_none());
    assert_eq!(stmt.advance().map_err(|e| e.kind()).err(), Some(ErrorKind::State));
    drop(stmt);

    // Rows arrive in fetch_size batches; interleaving another statement keeps both cursors intact.
    conn.execute_batch("INSERT INTO all_kinds (id) SELECT g FROM generate_series(2, 7) AS g")?;
    let mut ids = conn.prepare("SELECT id FROM all_kinds ORDER BY id")?;
    assert_eq!(ids.advance()?.ok_or("row")?.get("id"), Some(&Value::Integer(1)));
    let count = conn.fetch_all("SELECT COUNT(*) AS c FROM all_kinds", &[])?;
    assert_eq!(count.results[0].get("c"), Some(&Value::Integer(7)));
    let rest = ids
        .rows()
        .map(|row| row.map(|r| r.values()[0].clone()))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(rest, (2..=7).map(Value::Integer).collect::<Vec<_>>());
    drop(ids);

    // Server types without a tag of their own come back as text.
    let rs = conn.fetch_all(
        "SELECT 1.50::numeric AS amount, DATE '2024-02-29' AS day, 7::int4 AS small",
        &[],
    )?;
    let row = &rs.results[0];
    assert_eq!(row.get("amount"), Some(&Value::Text("1.50".into())));
    assert_eq!(row.get("day"), Some(&Value::Text("2024-02-29".into())));
    assert_eq!(row.get("small"), Some(&Value::Integer(7)));

    // Classification.
    let err = conn.prepare("SELEC 1").expect_err("typo");
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.native_code(), Some("42601"));

    for sql in ["SELECT 1; garbage", "SELECT 1; SELECT 2"] {
        let err = conn.prepare(sql).expect_err("one statement per prepare");
        assert_eq!(err.kind(), ErrorKind::Syntax, "{sql}: {err}");
    }

    let err = conn
        .execute("INSERT INTO all_kinds (id) VALUES ($1)", &[Value::Integer(1)])
        .expect_err("duplicate key");
    assert_eq!(err.kind(), ErrorKind::Constraint);
    assert_eq!(err.native_code(), Some("23505"));

    let err = conn
        .execute("SELECT id FROM all_kinds WHERE id = $1", &[])
        .expect_err("missing parameter");
    assert_eq!(err.kind(), ErrorKind::Binding);

    let err = conn
        .execute("UPDATE all_kinds SET f = $1 WHERE id = 1", &[Value::Blob(vec![1])])
        .expect_err("bytes into a boolean column");
    assert_eq!(err.kind(), ErrorKind::Binding);

    // A failed statement leaves the session usable.
    let stmt = conn.execute(
        "UPDATE all_kinds SET f = $1 WHERE id > $2",
        &[Value::Boolean(false), Value::Integer(3)],
    )?;
    assert_eq!(stmt.rows_affected(), Some(4));
    drop(stmt);

    // Closing invalidates outstanding statements.
    let mut pending = conn.prepare("SELECT 1")?;
    conn.close()?;
    assert_eq!(pending.advance().map_err(|e| e.kind()).err(), Some(ErrorKind::State));
    drop(pending);

    let err = Connection::open(NetworkedOptions {
        database: "no_such_database".into(),
        ..options.clone()
    })
    .expect_err("database does not exist");
    assert_eq!(err.kind(), ErrorKind::Connection);

    let err = Connection::open(NetworkedOptions {
        password: Some("wrong".into()),
        ..options.clone()
    })
    .expect_err("password is rejected");
    assert_eq!(err.kind(), ErrorKind::Connection);
    Ok(())
}
