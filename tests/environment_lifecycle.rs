#![cfg(all(feature = "sqlite", feature = "postgres"))]

// One test per binary: the counters are process-wide.

use sql_bridge::prelude::*;
use sql_bridge::{live_connections, runtime_active};

#[test]
fn live_count_follows_open_and_close() -> Result<(), Box<dyn std::error::Error>> {
    assert_eq!(live_connections(), 0);
    assert!(!runtime_active());

    let first = Connection::open(EmbeddedOptions::in_memory())?;
    let second = Connection::open(EmbeddedOptions::in_memory())?;
    assert_eq!(live_connections(), 2);
    // Embedded connections never start the networking runtime.
    assert!(!runtime_active());

    let unopened = Connection::new(EmbeddedOptions::in_memory());
    assert_eq!(live_connections(), 2);
    drop(unopened);

    first.close()?;
    first.close()?;
    assert_eq!(live_connections(), 1);

    // A failed networked open releases what it acquired.
    let refused = Connection::open(
        NetworkedOptions::new("127.0.0.1", "postgres", "postgres")
            .with_port(1)
            .with_connect_timeout_ms(2_000),
    );
    assert!(refused.is_err());
    assert_eq!(live_connections(), 1);
    assert!(!runtime_active());

    drop(second);
    assert_eq!(live_connections(), 0);
    Ok(())
}
