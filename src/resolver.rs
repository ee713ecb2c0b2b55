use std::net::IpAddr;
use std::time::Duration;

use tokio::net::lookup_host;
use tokio::time;
use tracing::debug;

use crate::error::ProbeError;

/// Resolve a hostname to a single address under the caller's timeout budget.
///
/// IPv4 addresses are preferred; the first IPv6 address is returned only when
/// the host has no A record. NXDOMAIN and lookup timeouts both fail with
/// `ProbeError::Resolution` — there are no retries here, retry policy belongs
/// to whoever re-runs the scan.
pub async fn resolve(host: &str, timeout: Duration) -> Result<IpAddr, ProbeError> {
    let addrs = time::timeout(timeout, lookup_host((host, 0u16)))
        .await
        .map_err(|_| ProbeError::Resolution {
            host: host.to_string(),
            detail: format!("lookup exceeded {timeout:?}"),
        })?
        .map_err(|e| ProbeError::Resolution {
            host: host.to_string(),
            detail: e.to_string(),
        })?;

    let mut first_v6: Option<IpAddr> = None;
    for addr in addrs {
        match addr.ip() {
            ip @ IpAddr::V4(_) => {
                debug!(host, %ip, "resolved");
                return Ok(ip);
            }
            ip @ IpAddr::V6(_) => {
                first_v6.get_or_insert(ip);
            }
        }
    }
    first_v6.ok_or_else(|| ProbeError::Resolution {
        host: host.to_string(),
        detail: "no addresses returned".to_string(),
    })
}
