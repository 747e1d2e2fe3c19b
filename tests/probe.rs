mod common;

use common::{
    http_response, probe_config, spawn_tls_relay, spawn_tls_relay_closing, Close, FULL_META,
};
use relay_probe::model::ProbeConfig;
use relay_probe::{ErrorKind, Prober, RelayProbe, Target};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

fn target(addr: std::net::SocketAddr) -> Target {
    Target::new(addr.ip().to_string(), addr.port())
}

#[tokio::test]
async fn alive_relay_yields_full_result() {
    let (addr, relay) = spawn_tls_relay(vec![http_response(FULL_META)], Duration::ZERO).await;
    let probe = RelayProbe::new(probe_config()).unwrap();

    let result = probe.probe(&target(addr)).await.unwrap();
    assert!(result.is_alive);
    assert_eq!(result.address, "127.0.0.1");
    assert_eq!(result.port, addr.port());
    assert_eq!(result.as_organization, "Acme");
    assert_eq!(result.country_code, "US");
    assert_eq!(result.country_name, "United States");
    assert_eq!(result.country_flag, "\u{1F1FA}\u{1F1F8}");
    assert_eq!(result.asn, 13335);
    assert_eq!(result.colo, "LAX");
    assert_eq!(result.http_protocol, "HTTP/1.1");
    assert_eq!(result.latitude, Value::String("34.05".into()));
    assert_eq!(result.longitude, Value::String("-118.25".into()));
    assert_eq!(
        result.message,
        format!("Cloudflare Proxy Alive 127.0.0.1:{}", addr.port())
    );

    let seen = relay.await.unwrap();
    assert_eq!(seen.sni.as_deref(), Some("speed.cloudflare.com"));
    assert!(seen.request.starts_with("GET /meta HTTP/1.1\r\n"));
    assert!(seen.request.contains("\r\nHost: speed.cloudflare.com\r\n"));
    assert!(seen.request.contains("\r\nUser-Agent: Mozilla/5.0\r\n"));
    assert!(seen.request.contains("\r\nConnection: close\r\n"));
}

#[tokio::test]
async fn presents_configured_upstream_identity() {
    let (addr, relay) = spawn_tls_relay(vec![http_response(FULL_META)], Duration::ZERO).await;
    let probe = RelayProbe::new(ProbeConfig {
        upstream_host: "meta.example.test".into(),
        path: "/cdn-cgi/meta".into(),
        ..probe_config()
    })
    .unwrap();

    probe.probe(&target(addr)).await.unwrap();
    let seen = relay.await.unwrap();
    assert_eq!(seen.sni.as_deref(), Some("meta.example.test"));
    assert!(seen.request.starts_with("GET /cdn-cgi/meta HTTP/1.1\r\n"));
    assert!(seen.request.contains("\r\nHost: meta.example.test\r\n"));
}

#[tokio::test]
async fn missing_organization_defaults_alone() {
    let body = r#"{"clientIp":"1.2.3.4","country":"US","asn":"13335","colo":"LAX","httpProtocol":"HTTP/1.1","latitude":"34.05","longitude":"-118.25"}"#;
    let (addr, _relay) = spawn_tls_relay(vec![http_response(body)], Duration::ZERO).await;
    let probe = RelayProbe::new(probe_config()).unwrap();

    let result = probe.probe(&target(addr)).await.unwrap();
    assert_eq!(result.as_organization, "Unknown");
    assert_eq!(result.country_code, "US");
    assert_eq!(result.country_name, "United States");
    assert_eq!(result.asn, 13335);
    assert_eq!(result.colo, "LAX");
    assert_eq!(result.http_protocol, "HTTP/1.1");
}

#[tokio::test]
async fn fragmented_response_is_reassembled() {
    let raw = http_response(FULL_META);
    let split_at = raw.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 2;
    let chunks = vec![
        raw[..split_at].to_vec(),
        raw[split_at..split_at + 10].to_vec(),
        raw[split_at + 10..].to_vec(),
    ];
    let (addr, _relay) = spawn_tls_relay(chunks, Duration::from_millis(20)).await;
    let probe = RelayProbe::new(probe_config()).unwrap();

    let result = probe.probe(&target(addr)).await.unwrap();
    assert_eq!(result.colo, "LAX");
}

#[tokio::test]
async fn unreachable_candidate_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let probe = RelayProbe::new(probe_config()).unwrap();
    let err = probe.probe(&target(addr)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn dropped_handshake_is_tls_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);
    });

    let probe = RelayProbe::new(probe_config()).unwrap();
    let err = probe.probe(&target(addr)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Tls);
}

#[tokio::test]
async fn plaintext_candidate_is_tls_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = socket
            .write_all(b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n")
            .await;
    });

    let probe = RelayProbe::new(probe_config()).unwrap();
    let err = probe.probe(&target(addr)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Tls);
}

#[tokio::test]
async fn non_json_body_is_parse_error() {
    let (addr, _relay) = spawn_tls_relay(vec![http_response("not json")], Duration::ZERO).await;
    let probe = RelayProbe::new(probe_config()).unwrap();

    let err = probe.probe(&target(addr)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert_eq!(err.to_string(), "Failed to parse JSON from proxy");
}

#[tokio::test]
async fn record_without_client_ip_is_parse_error() {
    let body = r#"{"asOrganization":"Acme","country":"US","colo":"LAX"}"#;
    let (addr, _relay) = spawn_tls_relay(vec![http_response(body)], Duration::ZERO).await;
    let probe = RelayProbe::new(probe_config()).unwrap();

    let err = probe.probe(&target(addr)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert_eq!(err.to_string(), "Invalid JSON response");
}

#[tokio::test]
async fn headers_without_body_is_parse_error() {
    let (addr, _relay) = spawn_tls_relay(
        vec![b"HTTP/1.1 502 Bad Gateway\r\nServer: relay\r\n".to_vec()],
        Duration::ZERO,
    )
    .await;
    let probe = RelayProbe::new(probe_config()).unwrap();

    let err = probe.probe(&target(addr)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[tokio::test]
async fn slower_candidate_reports_larger_delay() {
    let probe = RelayProbe::new(probe_config()).unwrap();

    let (fast_addr, _fast) = spawn_tls_relay(vec![http_response(FULL_META)], Duration::ZERO).await;
    let fast = probe.probe(&target(fast_addr)).await.unwrap();

    let raw = http_response(FULL_META);
    let (slow_addr, _slow) = spawn_tls_relay(
        vec![raw[..20].to_vec(), raw[20..].to_vec()],
        Duration::from_millis(300),
    )
    .await;
    let slow = probe.probe(&target(slow_addr)).await.unwrap();

    assert!(slow.delay_ms >= 300, "slow delay {}", slow.delay_ms);
    assert!(slow.delay_ms > fast.delay_ms);
}

#[tokio::test]
async fn stalled_relay_times_out_as_tls_error() {
    let (addr, _relay) = spawn_tls_relay(
        vec![b"HTTP/1.1 200 OK\r\n".to_vec()],
        Duration::from_secs(3),
    )
    .await;
    let probe = RelayProbe::new(ProbeConfig {
        read_timeout: Duration::from_millis(300),
        ..probe_config()
    })
    .unwrap();

    let err = probe.probe(&target(addr)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Tls);
}

#[tokio::test]
async fn trickling_relay_is_cut_off_by_overall_timeout() {
    let chunks = http_response(FULL_META)
        .into_iter()
        .map(|byte| vec![byte])
        .collect();
    let (addr, _relay) = spawn_tls_relay(chunks, Duration::from_millis(200)).await;
    let probe = RelayProbe::new(ProbeConfig {
        read_timeout: Duration::from_millis(300),
        overall_timeout: Duration::from_secs(1),
        ..probe_config()
    })
    .unwrap();

    let started = Instant::now();
    let err = probe.probe(&target(addr)).await.unwrap_err();
    let elapsed = started.elapsed();
    assert_eq!(err.kind(), ErrorKind::Tls);
    assert!(err.to_string().contains("overall timeout"), "{err}");
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
}

#[tokio::test]
async fn relay_closing_without_close_notify_after_response_is_alive() {
    let (addr, _relay) =
        spawn_tls_relay_closing(vec![http_response(FULL_META)], Duration::ZERO, Close::Drop).await;
    let probe = RelayProbe::new(probe_config()).unwrap();

    let result = probe.probe(&target(addr)).await.unwrap();
    assert!(result.is_alive);
    assert_eq!(result.colo, "LAX");
}

#[tokio::test]
async fn relay_closing_without_close_notify_before_response_is_tls_error() {
    let (addr, _relay) = spawn_tls_relay_closing(Vec::new(), Duration::ZERO, Close::Drop).await;
    let probe = RelayProbe::new(probe_config()).unwrap();

    let err = probe.probe(&target(addr)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Tls);
}
