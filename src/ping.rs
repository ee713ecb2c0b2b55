use tokio::time;
use tracing::{debug, warn};

use crate::error::ProbeError;
use crate::http;
use crate::resolver;
use crate::types::{ProbeOutcome, Target};

const ICMP_PAYLOAD: [u8; 56] = [0u8; 56];

/// ICMP echo probe with an HTTPS fallback.
///
/// When the transport signals that ICMP is administratively filtered (a
/// permission-class error, not a timeout), the probe substitutes an HTTPS
/// round-trip against port 443 and reports that latency with
/// `used_fallback = true`. A genuine echo timeout is reported as unreachable —
/// falling back there would mask real unreachability.
pub async fn probe_ping(target: &Target) -> Result<ProbeOutcome, ProbeError> {
    let ip = resolver::resolve(&target.host, target.timeout).await?;

    match time::timeout(target.timeout, surge_ping::ping(ip, &ICMP_PAYLOAD)).await {
        Ok(Ok((_reply, rtt))) => {
            debug!(host = %target.host, %ip, rtt_ms = rtt.as_millis() as u64, "icmp echo reply");
            Ok(ProbeOutcome::Ping {
                latency_ms: Some(rtt.as_millis() as u64),
                used_fallback: false,
                detail: format!("icmp echo reply from {ip}"),
            })
        }
        Ok(Err(err)) if icmp_filtered(&err) => {
            warn!(host = %target.host, %err, "icmp filtered, measuring via https instead");
            let fallback = Target::new(target.host.clone(), 443, target.timeout);
            Ok(https_fallback(&fallback).await)
        }
        Ok(Err(err)) => Ok(ProbeOutcome::Ping {
            latency_ms: None,
            used_fallback: false,
            detail: format!("icmp echo failed: {err}"),
        }),
        Err(_) => Ok(ProbeOutcome::Ping {
            latency_ms: None,
            used_fallback: false,
            detail: format!("icmp echo timed out after {:?}", target.timeout),
        }),
    }
}

/// Substitute an HTTPS round-trip for a blocked ICMP echo. The reported
/// latency is the HTTP probe's headers-received measurement, so fallback rows
/// stay comparable with `Up` latencies in the chart view.
pub async fn https_fallback(target: &Target) -> ProbeOutcome {
    match http::probe_http(target, true).await {
        Ok(ProbeOutcome::Up { latency_ms, .. }) => ProbeOutcome::Ping {
            latency_ms: Some(latency_ms),
            used_fallback: true,
            detail: format!("https round-trip to {}:{}", target.host, target.port),
        },
        Ok(other) => ProbeOutcome::Ping {
            latency_ms: None,
            used_fallback: true,
            detail: format!("https fallback got no response: {}", other.describe()),
        },
        Err(err) => ProbeOutcome::Ping {
            latency_ms: None,
            used_fallback: true,
            detail: format!("https fallback failed: {err}"),
        },
    }
}

/// The filtering signal: the OS refused to send/receive the echo at all, as
/// opposed to the echo going unanswered. Unprivileged ICMP sockets and
/// administrative filtering both surface as permission-class IO errors.
fn icmp_filtered(err: &surge_ping::SurgeError) -> bool {
    match err {
        surge_ping::SurgeError::IOError(e) => {
            matches!(e.kind(), std::io::ErrorKind::PermissionDenied)
                || e.raw_os_error() == Some(1) // EPERM
        }
        _ => false,
    }
}
