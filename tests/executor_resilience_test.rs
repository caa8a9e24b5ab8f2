//! Resilience tests against real sockets.
//!
//! The mock server cannot simulate transport-level failure, so these tests
//! drive the executor against raw TCP listeners: connections that are
//! refused, and connections that never answer within the read timeout.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use keystone_erp::{ClientConfig, ErpClient, ErpError, RequestOptions, RetryPolicy};
use tracing_test::traced_test;

fn client_for(api_base: String, max_retries: u32, read_timeout: Duration) -> ErpClient {
    ErpClient::new(
        ClientConfig::builder()
            .api_base(api_base)
            .max_retries(max_retries)
            .read_timeout(read_timeout)
            .open_timeout(Duration::from_secs(2))
            .build(),
    )
    .with_retry_policy(
        RetryPolicy::new()
            .with_max_retries(max_retries)
            .with_initial_backoff(Duration::from_millis(1)),
    )
}

/// Hold a connection open without answering, so the client's read timeout
/// fires; then drop it.
fn stall_one_connection(listener: &TcpListener, hold: Duration) {
    if let Ok((_stream, _)) = listener.accept() {
        thread::sleep(hold);
    }
}

fn answer_one_connection(listener: &TcpListener, body: &str) {
    if let Ok((mut stream, _)) = listener.accept() {
        let mut buf = [0u8; 8192];
        let _ = stream.read(&mut buf);
        let _ = write!(
            stream,
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = stream.flush();
    }
}

#[test]
fn refused_connections_are_retried_and_reported_with_the_retry_count() {
    // Bind to grab a free port, then close it so connections are refused.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(format!("http://{addr}"), 2, Duration::from_secs(1));
    let err = client.get("/v1/ping", RequestOptions::new()).unwrap_err();

    match &err {
        ErpError::ConnectionError(message) => {
            assert!(
                message.contains("Request was retried 2 times."),
                "message missing retry count: {message}"
            );
            assert!(
                message.contains("(Network error:"),
                "message missing low-level diagnostic: {message}"
            );
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
    assert!(err.is_retryable());
}

#[traced_test]
#[test]
fn timeouts_are_retried_until_the_transport_answers() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        // Two attempts starve past the client's read timeout, the third is
        // answered normally.
        stall_one_connection(&listener, Duration::from_millis(220));
        stall_one_connection(&listener, Duration::from_millis(220));
        answer_one_connection(&listener, r#"{"object":"ping"}"#);
    });

    let client = client_for(format!("http://{addr}"), 3, Duration::from_millis(200));
    let response = client.get("/v1/ping", RequestOptions::new()).unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.payload()["object"], "ping");

    // The success-side log reports how many retries the call consumed.
    assert!(logs_contain("retries=2"));
    server.join().unwrap();
}

#[test]
fn exhausted_timeouts_surface_a_timeout_error_naming_the_limit() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        // One initial attempt plus three retries, all starved.
        for _ in 0..4 {
            stall_one_connection(&listener, Duration::from_millis(150));
        }
    });

    let client = client_for(format!("http://{addr}"), 3, Duration::from_millis(100));
    let err = client.get("/v1/ping", RequestOptions::new()).unwrap_err();

    match &err {
        ErpError::TimeoutError(message) => {
            assert!(
                message.contains("Request was retried 3 times."),
                "message missing retry count: {message}"
            );
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
    server.join().unwrap();
}
