#![cfg(feature = "sqlite")]

use sql_bridge::prelude::*;
use tempfile::tempdir;

#[test]
fn file_database_persists_across_connections() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("persist.db").to_string_lossy().into_owned();

    let writer = EmbeddedOptionsBuilder::new(path.clone())
        .journal_mode("WAL")
        .busy_timeout_ms(2_000)
        .open()?;
    writer.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)")?;
    for (id, body) in [(1, "first"), (2, "second")] {
        drop(writer.execute(
            "INSERT INTO notes (id, body) VALUES (?1, ?2)",
            &[Value::Integer(id), Value::Text(body.into())],
        )?);
    }

    // A second connection on the same file sees committed rows while the first is open.
    let reader = Connection::open(EmbeddedOptions::new(path.clone()))?;
    let rs = reader.fetch_all("SELECT body FROM notes ORDER BY id", &[])?;
    let bodies: Vec<&Value> = rs.results.iter().filter_map(|row| row.get("body")).collect();
    assert_eq!(
        bodies,
        vec![&Value::Text("first".into()), &Value::Text("second".into())]
    );

    writer.close()?;
    reader.close()?;

    let reopened = Connection::open(EmbeddedOptions::new(path))?;
    let count = reopened.fetch_all("SELECT COUNT(*) AS n FROM notes", &[])?;
    assert_eq!(count.results[0].get("n"), Some(&Value::Integer(2)));
    Ok(())
}

#[test]
fn foreign_keys_can_be_disabled() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(EmbeddedOptions::in_memory().with_foreign_keys(false))?;
    conn.execute_batch(
        "CREATE TABLE parent (id INTEGER PRIMARY KEY);
         CREATE TABLE child (parent_id INTEGER REFERENCES parent(id));",
    )?;
    let stmt = conn.execute("INSERT INTO child VALUES (?1)", &[Value::Integer(7)])?;
    assert_eq!(stmt.rows_affected(), Some(1));
    Ok(())
}

#[test]
fn unopenable_path_is_a_connection_error() {
    let err = Connection::open(EmbeddedOptions::new("/nonexistent-dir/deeper/db.sqlite"))
        .expect_err("parent directory does not exist");
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[test]
fn unknown_journal_mode_fails_validation() {
    let conn = Connection::new(EmbeddedOptions::in_memory().with_journal_mode("SIDEWAYS"));
    let err = conn.connect().expect_err("invalid journal mode");
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(conn.state(), ConnectionState::Unopened);
}
