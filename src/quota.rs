use std::net::SocketAddr;

use reqwest::header::{CONNECTION, HOST, LOCATION, USER_AGENT};
use tracing::debug;

use crate::config::QuotaOptions;
use crate::error::ProbeError;
use crate::http::classify_send_error;
use crate::resolver;
use crate::types::{ProbeOutcome, Target};

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Quota-bypass heuristic probe.
///
/// Sends a GET carrying a Host header that asserts a zero-rated access class
/// and checks whether the host serves content instead of bouncing the request
/// to a paywall/login page. Best-effort signal only — a 2xx here proves the
/// host misclassified the traffic once, nothing more.
pub async fn probe_quota(target: &Target, opts: &QuotaOptions) -> Result<ProbeOutcome, ProbeError> {
    let ip = resolver::resolve(&target.host, target.timeout).await?;
    let scheme = if target.port == 443 { "https" } else { "http" };
    let url = format!("{scheme}://{}:{}/", target.host, target.port);

    let client = reqwest::Client::builder()
        .timeout(target.timeout)
        .redirect(reqwest::redirect::Policy::none())
        .danger_accept_invalid_certs(true)
        .resolve(&target.host, SocketAddr::new(ip, target.port))
        .build()
        .map_err(|e| ProbeError::Connection(e.to_string()))?;

    let resp = client
        .get(&url)
        .header(HOST, opts.host_header.as_str())
        .header(USER_AGENT, BROWSER_UA)
        .header(CONNECTION, "close")
        .send()
        .await
        .map_err(|e| classify_send_error(&e, target.timeout))?;

    let status = resp.status();
    debug!(host = %target.host, status = status.as_u16(), "quota probe response");

    if status.is_success() {
        return Ok(ProbeOutcome::QuotaBug {
            bypass_confirmed: true,
            detail: format!("HTTP {} with zero-rated host header", status.as_u16()),
        });
    }

    if status.is_redirection() {
        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let lower = location.to_lowercase();
        if let Some(keyword) = opts
            .denylist
            .iter()
            .find(|kw| lower.contains(&kw.to_lowercase()))
        {
            return Ok(ProbeOutcome::QuotaBug {
                bypass_confirmed: false,
                detail: format!("redirected to {location} (denylist match: {keyword})"),
            });
        }
        // Not on the denylist: the redirect could be anything from a locale
        // bounce to an unlisted portal. Report it as inconclusive.
        return Ok(ProbeOutcome::QuotaBug {
            bypass_confirmed: false,
            detail: format!("ambiguous redirect to {location}; not on denylist"),
        });
    }

    Ok(ProbeOutcome::QuotaBug {
        bypass_confirmed: false,
        detail: format!("returned HTTP {}", status.as_u16()),
    })
}
