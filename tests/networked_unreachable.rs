#![cfg(feature = "postgres")]

use std::time::{Duration, Instant};

use sql_bridge::prelude::*;

#[test]
fn refused_port_is_a_connection_error() {
    let conn = Connection::new(
        NetworkedOptions::new("127.0.0.1", "postgres", "postgres")
            .with_port(1)
            .with_connect_timeout_ms(2_000),
    );
    let err = conn.connect().expect_err("nothing listens on port 1");
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(conn.state(), ConnectionState::Unopened);
    assert_eq!(conn.kind(), BackendKind::Networked);
}

#[test]
fn handshake_gives_up_after_the_timeout() {
    // Non-routable address: the TCP handshake either hangs until the deadline or fails fast.
    let started = Instant::now();
    let err = Connection::open(
        NetworkedOptions::new("10.255.255.1", "postgres", "postgres").with_connect_timeout_ms(300),
    )
    .expect_err("address is unreachable");
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(started.elapsed() < Duration::from_secs(10));
}
