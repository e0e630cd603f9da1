//! HTTP sink against a one-shot loopback server: method, body, status codes,
//! and transport failures.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::JoinHandle;
use std::time::Duration;

use consent_core::{ConsentStatus, ConsentTransmission};
use consent_sync::{ConsentSink, HttpSink};

struct Recorded {
    request_line: String,
    body: String,
}

/// Accept one connection, capture the request, answer with `status`.
fn serve_once(status: u16) -> (String, JoinHandle<Recorded>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let url = format!("http://{}/consent", listener.local_addr().unwrap());

    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            let n = stream.read(&mut chunk).expect("read");
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|l| l.split_once(':'))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
            .map(|(_, v)| v.trim().parse::<usize>().expect("content-length"))
            .unwrap_or(0);
        while buf.len() < header_end + content_length {
            let n = stream.read(&mut chunk).expect("read body");
            assert!(n > 0, "client closed mid-body");
            buf.extend_from_slice(&chunk[..n]);
        }

        let reason = if status < 400 { "OK" } else { "Error" };
        write!(
            stream,
            "HTTP/1.1 {status} {reason}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        )
        .expect("respond");

        Recorded {
            request_line: head.lines().next().unwrap_or_default().to_string(),
            body: String::from_utf8_lossy(&buf[header_end..header_end + content_length])
                .to_string(),
        }
    });

    (url, handle)
}

fn payload() -> ConsentTransmission {
    ConsentTransmission::new(ConsentStatus::Accepted, "test", 1000).unwrap()
}

#[tokio::test]
async fn posts_json_body() {
    let (url, server) = serve_once(204);
    let response = HttpSink::new(url, Duration::from_secs(5))
        .submit(&payload())
        .await
        .expect("submit");
    let recorded = server.join().unwrap();

    assert!(response.succeeded());
    assert_eq!(response.status_code, 204);
    assert!(
        recorded.request_line.starts_with("POST /consent "),
        "got: {}",
        recorded.request_line
    );
    assert_eq!(
        recorded.body,
        r#"{"status":"accept","device_id":"test","date":"1970-01-01T00:00:01Z"}"#
    );
}

#[tokio::test]
async fn error_status_is_a_response_not_a_transport_failure() {
    let (url, server) = serve_once(400);
    let response = HttpSink::new(url, Duration::from_secs(5))
        .submit(&payload())
        .await
        .expect("submit");
    server.join().unwrap();

    assert_eq!(response.status_code, 400);
    assert!(!response.succeeded());
}

#[tokio::test]
async fn refused_connection_is_a_transport_failure() {
    let url = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        format!("http://{}/consent", listener.local_addr().unwrap())
    };
    let err = HttpSink::new(url, Duration::from_secs(2))
        .submit(&payload())
        .await
        .unwrap_err();
    assert!(!err.to_string().is_empty());
}
