use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use host_probe_rs::config::ProbeConfig;
use host_probe_rs::orchestrator::{run_batch, run_probe};
use host_probe_rs::report::latency_view;
use host_probe_rs::types::{ProbeKind, ProbeOutcome, Target};

const OK_RESPONSE: &str = "HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";

async fn spawn_delayed_server(delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = sock.read(&mut buf).await;
                tokio::time::sleep(delay).await;
                let _ = sock.write_all(OK_RESPONSE.as_bytes()).await;
                let _ = sock.shutdown().await;
            });
        }
    });
    addr
}

fn refused_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

#[tokio::test]
async fn batch_preserves_input_order_under_random_delays() {
    let mut targets = Vec::new();
    {
        let mut rng = rand::rng();
        for _ in 0..8 {
            let delay = Duration::from_millis(rng.random_range(0..150));
            let addr = spawn_delayed_server(delay).await;
            targets.push(Target::new("127.0.0.1", addr.port(), Duration::from_secs(5)));
        }
    }
    // A refused host in the middle must keep its slot without disturbing the rest.
    let refused = refused_port().unwrap();
    targets.insert(
        4,
        Target::new("127.0.0.1", refused, Duration::from_secs(5)),
    );

    let config = ProbeConfig {
        concurrency: 4,
        ..ProbeConfig::default()
    };
    let report = run_batch(&targets, ProbeKind::Http, &config).await;

    assert_eq!(report.len(), targets.len(), "one record per input target");
    for (record, target) in report.records.iter().zip(&targets) {
        assert_eq!(
            record.target.port, target.port,
            "records must be ordered by input index, not completion order"
        );
    }
    assert!(
        matches!(report.records[4].outcome, ProbeOutcome::Down { .. }),
        "the refused host is reported, never silently dropped"
    );

    // The chart view keeps a row (with a gap) for the down host too.
    let view = latency_view(&report);
    assert_eq!(view.len(), targets.len());
    assert_eq!(view[4].latency_ms, None);
}

#[tokio::test]
async fn transient_failure_is_not_retried() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));
    let accepts_srv = accepts.clone();
    tokio::spawn(async move {
        // Close every connection before answering; a retry would show up as a
        // second accept.
        while let Ok((sock, _)) = listener.accept().await {
            accepts_srv.fetch_add(1, Ordering::SeqCst);
            drop(sock);
        }
    });

    let target = Target::new("127.0.0.1", addr.port(), Duration::from_secs(2));
    let record = run_probe(&target, ProbeKind::Http, &ProbeConfig::default()).await;
    assert!(matches!(record.outcome, ProbeOutcome::Down { .. }));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        accepts.load(Ordering::SeqCst),
        1,
        "a single transient failure must not trigger hidden retries"
    );
}

#[tokio::test]
async fn repeated_probe_differs_only_in_timing() {
    let addr = spawn_delayed_server(Duration::ZERO).await;
    let target = Target::new("127.0.0.1", addr.port(), Duration::from_secs(5));
    let config = ProbeConfig::default();

    let first = run_probe(&target, ProbeKind::Http, &config).await;
    let second = run_probe(&target, ProbeKind::Http, &config).await;

    assert_eq!(first.target, second.target);
    assert_eq!(first.kind, second.kind);
    match (&first.outcome, &second.outcome) {
        (
            ProbeOutcome::Up {
                status: s1,
                resolved_ip: ip1,
                ..
            },
            ProbeOutcome::Up {
                status: s2,
                resolved_ip: ip2,
                ..
            },
        ) => {
            assert_eq!(s1, s2);
            assert_eq!(ip1, ip2);
        }
        other => panic!("expected two Up outcomes, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_batch_yields_empty_report() {
    let report = run_batch(&[], ProbeKind::Http, &ProbeConfig::default()).await;
    assert!(report.is_empty());
}
