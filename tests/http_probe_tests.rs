use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use host_probe_rs::config::ProbeConfig;
use host_probe_rs::orchestrator::run_probe;
use host_probe_rs::types::{DownReason, ProbeKind, ProbeOutcome, Target};

const OK_RESPONSE: &str = "HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";

/// Minimal scripted HTTP responder: read the request, wait, answer, close.
async fn spawn_http_server(delay: Duration, response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = sock.read(&mut buf).await;
                tokio::time::sleep(delay).await;
                let _ = sock.write_all(response.as_bytes()).await;
                let _ = sock.shutdown().await;
            });
        }
    });
    addr
}

#[tokio::test]
async fn delayed_200_reports_up_with_latency() {
    let addr = spawn_http_server(Duration::from_millis(50), OK_RESPONSE).await;
    let target = Target::new("127.0.0.1", addr.port(), Duration::from_secs(5));

    let record = run_probe(&target, ProbeKind::Http, &ProbeConfig::default()).await;
    match record.outcome {
        ProbeOutcome::Up {
            status,
            latency_ms,
            resolved_ip,
        } => {
            assert_eq!(status, 200);
            assert!(
                latency_ms >= 50,
                "latency {latency_ms} ms should include the 50 ms server delay"
            );
            assert!(latency_ms < 2_000, "latency {latency_ms} ms is implausibly high");
            assert!(resolved_ip.is_loopback());
        }
        other => panic!("expected Up, got {other:?}"),
    }
}

#[tokio::test]
async fn non_2xx_status_is_still_up() {
    let addr = spawn_http_server(
        Duration::ZERO,
        "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
    )
    .await;
    let target = Target::new("127.0.0.1", addr.port(), Duration::from_secs(5));

    let record = run_probe(&target, ProbeKind::Http, &ProbeConfig::default()).await;
    match record.outcome {
        ProbeOutcome::Up { status, .. } => assert_eq!(status, 503),
        other => panic!("expected Up with 503, got {other:?}"),
    }
}

#[tokio::test]
async fn refused_connection_reports_down() {
    // Bind to grab a free port, then drop the listener so connects are refused.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let target = Target::new("127.0.0.1", addr.port(), Duration::from_secs(2));
    let record = run_probe(&target, ProbeKind::Http, &ProbeConfig::default()).await;
    match record.outcome {
        ProbeOutcome::Down { reason, detail } => {
            assert_eq!(reason, DownReason::ConnectionRefused);
            assert!(!detail.is_empty(), "failure detail must be human-readable");
        }
        other => panic!("expected Down, got {other:?}"),
    }
}

#[tokio::test]
async fn silent_socket_times_out_within_budget() {
    // Accepts and reads but never responds.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match sock.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
            });
        }
    });

    let timeout = Duration::from_millis(500);
    let target = Target::new("127.0.0.1", addr.port(), timeout);

    let started = Instant::now();
    let record = run_probe(&target, ProbeKind::Http, &ProbeConfig::default()).await;
    let elapsed = started.elapsed();

    assert!(
        elapsed <= timeout + Duration::from_millis(400),
        "probe took {elapsed:?}, budget was {timeout:?}"
    );
    assert!(
        matches!(
            record.outcome,
            ProbeOutcome::Down {
                reason: DownReason::Timeout,
                ..
            }
        ),
        "expected timeout outcome, got {:?}",
        record.outcome
    );
}

#[tokio::test]
async fn dns_failure_reports_down_with_dns_reason() {
    let target = Target::new(
        "does-not-exist.invalid",
        443,
        Duration::from_secs(3),
    );
    let record = run_probe(&target, ProbeKind::Http, &ProbeConfig::default()).await;
    match record.outcome {
        ProbeOutcome::Down { reason, detail } => {
            assert_eq!(reason, DownReason::DnsError);
            assert!(detail.contains("does-not-exist.invalid"));
        }
        other => panic!("expected Down with dns error, got {other:?}"),
    }
}
