//! Explicit configuration passed into every probe call. The core holds no
//! process-wide mutable state; the caller owns one of these per scan.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::TunnelProtocol;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Configuration surface consumed by the probing core.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProbeConfig {
    /// Per-probe wall-clock budget.
    pub timeout: Duration,
    /// Maximum probes in flight during a batch run.
    pub concurrency: usize,
    /// Try HTTPS first even on non-443 ports.
    pub prefer_tls: bool,
    pub tunnel: TunnelOptions,
    pub quota: QuotaOptions,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            prefer_tls: false,
            tunnel: TunnelOptions::default(),
            quota: QuotaOptions::default(),
        }
    }
}

/// Options for the WebSocket tunnel-handshake probe.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TunnelOptions {
    pub protocol: TunnelProtocol,
    /// VMESS UUID or TROJAN password.
    pub identifier: String,
    /// Upgrade path used when the target itself carries none.
    pub path: String,
    /// Connect over wss; never silently downgraded to ws.
    pub use_tls: bool,
}

impl Default for TunnelOptions {
    fn default() -> Self {
        Self {
            protocol: TunnelProtocol::Vmess,
            identifier: String::new(),
            path: "/".to_string(),
            use_tls: false,
        }
    }
}

/// Options for the quota-bypass heuristic probe. The denylist is externally
/// supplied because paywall/login redirect wording is provider-specific.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QuotaOptions {
    /// Host header asserting the zero-rated access class.
    pub host_header: String,
    /// Case-insensitive substrings matched against redirect locations.
    pub denylist: Vec<String>,
}

impl Default for QuotaOptions {
    fn default() -> Self {
        Self {
            host_header: "www.ruangguru.com".to_string(),
            denylist: default_denylist(),
        }
    }
}

pub fn default_denylist() -> Vec<String> {
    ["login", "paywall", "billing", "subscribe", "auth"]
        .into_iter()
        .map(str::to_string)
        .collect()
}
