//! End-to-end behaviour of the socket client against loopback TSDs.

use std::{thread, time::Duration};

use rstest::{fixture, rstest};
use serde_json::json;
use tsdb_client::{
    ClientError, ConnectionPhase, ExhaustionPolicy, FailureKind, Meter, SharedSocketClient,
    SocketClient, SocketClientBuilder, from_ini_str,
    test_utils::{FakeTsd, closed_endpoint},
};

const WAIT: Duration = Duration::from_secs(3);

#[fixture]
fn tsd() -> FakeTsd {
    FakeTsd::start()
}

fn cpu(ts: i64, host: &str) -> Meter {
    Meter::new("sys.cpu.user", ts, 42, [("host", host)]).expect("valid meter")
}

#[rstest]
fn single_endpoint_round_trip(tsd: FakeTsd) {
    let mut client = SocketClient::new([tsd.endpoint()]).expect("client");
    client.submit([cpu(1, "web01")], false).expect("buffered");
    assert_eq!(tsd.connections(), 0);

    client.flush().expect("flushed");

    assert_eq!(tsd.wait_for_puts(1, WAIT), ["put sys.cpu.user 1 42 host=web01"]);
    assert_eq!(client.connection().phase(), ConnectionPhase::Verified);
}

#[rstest]
fn one_connection_serves_many_flushes(tsd: FakeTsd) {
    let mut client = SocketClient::new([tsd.endpoint()]).expect("client");
    for ts in 0..5 {
        client.submit([cpu(ts, "web01")], true).expect("flushed");
    }
    assert_eq!(tsd.wait_for_puts(5, WAIT).len(), 5);
    assert_eq!(tsd.connections(), 1);
    assert_eq!(tsd.probes(), 1, "trust window skips later probes");
}

#[rstest]
fn fails_over_after_primary_dies() {
    let primary = FakeTsd::start();
    let backup = FakeTsd::start();
    let mut client = SocketClientBuilder::new()
        .with_endpoints([primary.endpoint(), backup.endpoint()])
        .with_trust_window_ms(1)
        .with_connect_timeout_ms(500)
        .with_io_timeout_ms(500)
        .with_max_attempts(6)
        .with_exhaustion_policy(ExhaustionPolicy::ClearInOrder)
        .build()
        .expect("client");

    client.submit([cpu(1, "a")], true).expect("sent to primary");
    assert_eq!(primary.wait_for_puts(1, WAIT).len(), 1);
    let primary_endpoint = primary.endpoint();
    drop(primary);
    // Let the trust window lapse so the next flush probes the dead socket.
    thread::sleep(Duration::from_millis(20));

    client.submit([cpu(2, "b")], true).expect("sent to backup");

    assert_eq!(backup.wait_for_puts(1, WAIT), ["put sys.cpu.user 2 42 host=b"]);
    assert!(
        client
            .connection()
            .selector()
            .is_blacklisted(&primary_endpoint)
    );
}

#[rstest]
fn shared_client_accepts_meters_from_many_threads(tsd: FakeTsd) {
    let client: SharedSocketClient = SocketClientBuilder::new()
        .with_endpoints([tsd.endpoint()])
        .with_send_queue_max_size(7)
        .build()
        .expect("client")
        .into();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let client = client.clone();
            thread::spawn(move || {
                for ts in 0..10 {
                    client
                        .submit([cpu(ts, &format!("worker{worker}"))], false)
                        .expect("submit");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker thread");
    }
    client.flush().expect("final flush");

    assert_eq!(client.pending_len(), 0);
    assert_eq!(tsd.wait_for_puts(40, WAIT).len(), 40);
}

#[rstest]
fn json_records_are_sent_as_lines(tsd: FakeTsd) {
    let mut client = SocketClient::new([tsd.endpoint()]).expect("client");
    client
        .submit_json(
            &json!([
                {"metric": "bla1", "timestamp": "12345", "value": 123, "tags": {"some_tag": "foo"}},
                {"metric": "bla2", "timestamp": 23456, "value": "1.5", "tags": {"some_tag": "foo"}}
            ]),
            true,
        )
        .expect("flushed");
    assert_eq!(
        tsd.wait_for_puts(2, WAIT),
        [
            "put bla1 12345 123 some_tag=foo",
            "put bla2 23456 1.5 some_tag=foo"
        ]
    );
}

#[rstest]
fn malformed_json_is_rejected_with_shape() {
    let mut client = SocketClient::new([closed_endpoint()]).expect("client");
    let err = client
        .submit_json(&json!({"metric": "bla", "value": 1, "tags": {"a": "b"}}), true)
        .expect_err("timestamp missing");
    assert_eq!(err.kind(), FailureKind::Format);
    let ClientError::Format(format) = err else {
        panic!("expected format error");
    };
    assert!(format.to_string().contains("metric"));
    assert!(client.pending().is_empty());
}

#[rstest]
fn ini_configured_client_sends(tsd: FakeTsd) {
    let ini = format!("[tsdb]\nhosts = {}\nmax_attempts = 3\n", tsd.endpoint());
    let mut client = from_ini_str(&ini, "inline")
        .and_then(|builder| builder.build())
        .expect("client");
    client.submit([cpu(9, "ini")], true).expect("flushed");
    assert_eq!(tsd.wait_for_puts(1, WAIT).len(), 1);
}
