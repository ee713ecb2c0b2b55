use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::ProbeError;
use crate::resolver;
use crate::types::{ProbeOutcome, Target};

/// HTTP/HTTPS reachability probe.
///
/// Tries HTTPS first when `prefer_tls` is set or the port is 443, and falls
/// back to plain HTTP on the same port after a TLS or connection failure.
/// Latency covers connection start to response headers received, not the full
/// body. Any HTTP status is reported as `Up` — reachability, not health.
pub async fn probe_http(target: &Target, prefer_tls: bool) -> Result<ProbeOutcome, ProbeError> {
    let ip = resolver::resolve(&target.host, target.timeout).await?;
    let https_first = prefer_tls || target.port == 443;

    if !https_first {
        return attempt("http", target, ip).await;
    }

    match attempt("https", target, ip).await {
        Ok(outcome) => Ok(outcome),
        // A timed-out HTTPS attempt has spent the budget; don't pile a second
        // attempt on top of it.
        Err(err @ ProbeError::Timeout(_)) => Err(err),
        Err(primary) => {
            debug!(host = %target.host, %primary, "https attempt failed, retrying over plain http");
            match attempt("http", target, ip).await {
                Ok(outcome) => Ok(outcome),
                // Prefer the TLS failure when both schemes fail; it names the
                // actual obstacle.
                Err(_) if matches!(primary, ProbeError::Tls(_)) => Err(primary),
                Err(fallback) => Err(fallback),
            }
        }
    }
}

async fn attempt(scheme: &str, target: &Target, ip: IpAddr) -> Result<ProbeOutcome, ProbeError> {
    let client = reqwest::Client::builder()
        .timeout(target.timeout)
        .redirect(reqwest::redirect::Policy::none())
        // Scans hit fronting hosts by resolved IP; hostname mismatches are
        // expected and not what this probe measures.
        .danger_accept_invalid_certs(true)
        .resolve(&target.host, SocketAddr::new(ip, target.port))
        .build()
        .map_err(|e| ProbeError::Connection(e.to_string()))?;

    let url = format!("{scheme}://{}:{}/", target.host, target.port);
    let start = Instant::now();
    let resp = client
        .get(&url)
        .send()
        .await
        .map_err(|e| classify_send_error(&e, target.timeout))?;
    let latency_ms = start.elapsed().as_millis() as u64;

    debug!(host = %target.host, %url, status = resp.status().as_u16(), latency_ms, "http probe response");
    Ok(ProbeOutcome::Up {
        status: resp.status().as_u16(),
        latency_ms,
        resolved_ip: ip,
    })
}

/// Map a reqwest send error onto the probe taxonomy. TLS failures surface
/// deep in the error chain, so classification walks the whole chain.
pub(crate) fn classify_send_error(err: &reqwest::Error, budget: Duration) -> ProbeError {
    if err.is_timeout() {
        return ProbeError::Timeout(budget);
    }
    let detail = error_chain(err);
    let lower = detail.to_lowercase();
    if lower.contains("tls")
        || lower.contains("ssl")
        || lower.contains("certificate")
        || lower.contains("handshake")
    {
        ProbeError::Tls(detail)
    } else {
        ProbeError::Connection(detail)
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(s) = source {
        detail.push_str(": ");
        detail.push_str(&s.to_string());
        source = s.source();
    }
    detail
}
