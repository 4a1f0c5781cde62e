//! Tests for the HTTP client against a loopback server.

use std::{
    io::{BufRead, BufReader, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::mpsc,
    thread,
    time::Duration,
};

use rstest::{fixture, rstest};
use serde_json::{Value, json};

use crate::{meter::Meter, test_utils::closed_endpoint};

use super::{AuthConfig, HttpClient, HttpClientConfig, HttpError, HttpResponse};

const RECV: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct CapturedRequest {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl CapturedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

fn read_http_request(stream: &mut TcpStream) -> CapturedRequest {
    let _ = stream.set_read_timeout(Some(RECV));
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .expect("read request line");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_owned();
    let path = parts.next().unwrap_or_default().to_owned();

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("read header");
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_lowercase();
            let value = value.trim().to_owned();
            if key == "content-length" {
                content_length = value.parse().unwrap_or(0);
            }
            headers.push((key, value));
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).expect("read body");
    CapturedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    }
}

/// Serve one canned response per entry and report each request seen.
fn spawn_server(
    listener: TcpListener,
    responses: Vec<(u16, &'static str)>,
) -> (SocketAddr, mpsc::Receiver<CapturedRequest>) {
    let addr = listener.local_addr().expect("listener has address");
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for (status, body) in responses {
            let Ok((mut stream, _)) = listener.accept() else {
                break;
            };
            let captured = read_http_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                status_text(status),
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = tx.send(captured);
        }
    });
    (addr, rx)
}

#[fixture]
fn tcp_listener() -> TcpListener {
    TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener")
}

fn client_for(addr: SocketAddr) -> HttpClient {
    HttpClient::new(addr.ip().to_string(), addr.port())
}

#[rstest]
#[case::stats(HttpClient::get_statistics, "/api/stats")]
#[case::aggregators(HttpClient::get_aggregators, "/api/aggregators")]
#[case::version(HttpClient::get_version, "/api/version")]
fn simple_gets_hit_their_paths(
    tcp_listener: TcpListener,
    #[case] call: fn(&HttpClient) -> Result<HttpResponse, HttpError>,
    #[case] path: &str,
) {
    let (addr, rx) = spawn_server(tcp_listener, vec![(200, r#"{"ok":true}"#)]);
    let response = call(&client_for(addr)).expect("response");

    let captured = rx.recv_timeout(RECV).expect("request");
    assert_eq!(captured.method, "GET");
    assert_eq!(captured.path, path);
    assert_eq!(
        response,
        HttpResponse {
            status: 200,
            body: r#"{"ok":true}"#.into()
        }
    );
}

#[rstest]
fn query_string_is_passed_through(tcp_listener: TcpListener) {
    let (addr, rx) = spawn_server(tcp_listener, vec![(200, "[]")]);
    client_for(addr)
        .get_query("start=0&end=12&m=max:2-min:bla")
        .expect("response");
    let captured = rx.recv_timeout(RECV).expect("request");
    assert_eq!(captured.path, "/api/query?start=0&end=12&m=max:2-min:bla");
}

#[rstest]
fn put_posts_one_request_per_meter(tcp_listener: TcpListener) {
    let (addr, rx) = spawn_server(tcp_listener, vec![(204, ""), (400, r#"{"error":{}}"#)]);
    let meters = [
        Meter::new("bla", 0, 123, [("some_tag", "foo")]).expect("valid meter"),
        Meter::new("bla", 1, 1.5, [("some_tag", "bar")]).expect("valid meter"),
    ];

    let responses = client_for(addr).put_meter(&meters).expect("responses");

    let statuses: Vec<u16> = responses.iter().map(|r| r.status).collect();
    assert_eq!(statuses, [204, 400], "error statuses are returned, not raised");
    let first = rx.recv_timeout(RECV).expect("first request");
    assert_eq!(first.method, "POST");
    assert_eq!(first.path, "/api/put?details");
    assert_eq!(first.header("content-type"), Some("application/json"));
    let body: Value = serde_json::from_str(&first.body).expect("json body");
    assert_eq!(
        body,
        json!({"metric": "bla", "timestamp": 0, "value": 123, "tags": {"some_tag": "foo"}})
    );
    let second = rx.recv_timeout(RECV).expect("second request");
    assert!(second.body.contains(r#""value":1.5"#));
}

#[rstest]
fn retention_encodes_tsuid(tcp_listener: TcpListener) {
    let (addr, rx) = spawn_server(tcp_listener, vec![(200, "{}"), (200, "{}")]);
    let client = client_for(addr);
    client.define_retention("foo", 12).expect("response");
    client.define_retention("00 01&x", 0).expect("response");

    let plain = rx.recv_timeout(RECV).expect("request");
    assert_eq!(plain.path, "/api/uid/tsmeta?tsuid=foo");
    assert_eq!(plain.body, r#"{"tsuid":"foo","retention":12}"#);
    let escaped = rx.recv_timeout(RECV).expect("request");
    assert_eq!(escaped.path, "/api/uid/tsmeta?tsuid=00%2001%26x");
}

#[rstest]
#[case::basic(
    AuthConfig::Basic { username: "user".into(), password: "pass".into() },
    "Basic dXNlcjpwYXNz"
)]
#[case::bearer(AuthConfig::Bearer { token: "secret".into() }, "Bearer secret")]
fn sends_authorization_header(
    tcp_listener: TcpListener,
    #[case] auth: AuthConfig,
    #[case] expected: &str,
) {
    let (addr, rx) = spawn_server(tcp_listener, vec![(200, "{}")]);
    let mut config = HttpClientConfig::new(addr.ip().to_string(), addr.port());
    config.auth = auth;
    config
        .headers
        .insert("X-Client".into(), "tsdb_client".into());
    HttpClient::with_config(config)
        .get_version()
        .expect("response");

    let captured = rx.recv_timeout(RECV).expect("request");
    assert_eq!(captured.header("authorization"), Some(expected));
    assert_eq!(captured.header("x-client"), Some("tsdb_client"));
}

#[rstest]
fn unreachable_server_is_a_transport_error() {
    let endpoint = closed_endpoint();
    let mut config = HttpClientConfig::new(endpoint.host, endpoint.port);
    config.connect_timeout = Duration::from_millis(500);
    let err = HttpClient::with_config(config)
        .get_version()
        .expect_err("nothing listening");
    assert!(matches!(err, HttpError::Transport { ref url, .. } if url.ends_with("/api/version")));
}

#[rstest]
fn process_response_returns_json() {
    let client = HttpClient::new("localhost", 4242);
    let value = client
        .process_response(200, r#"{"version":"2.4.0"}"#)
        .expect("valid document");
    assert_eq!(value["version"], "2.4.0");
}

#[rstest]
#[case::not_json("<html>oops</html>", "<html>oops</html>")]
#[case::error_object(r#"{"error":{"code":400,"message":"Unknown metric"}}"#, "Unknown metric")]
#[case::errors_list(r#"{"errors":[{"datapoint":{}}]}"#, r#"[{"datapoint":{}}]"#)]
fn process_response_surfaces_api_errors(#[case] body: &str, #[case] message: &str) {
    let client = HttpClient::new("localhost", 4242);
    match client.process_response(400, body) {
        Err(HttpError::Api { status, message: actual }) => {
            assert_eq!(status, 400);
            assert_eq!(actual, message);
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[rstest]
fn ipv6_hosts_are_bracketed() {
    assert_eq!(HttpClientConfig::new("::1", 4242).base_url(), "http://[::1]:4242");
    assert_eq!(HttpClientConfig::default().base_url(), "http://localhost:4242");
}
