use std::net::IpAddr;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One host to probe. Immutable; a fresh `Target` is built per probe invocation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    /// WebSocket path for tunnel probes; unused by the other probe kinds.
    pub path: Option<String>,
    pub timeout: Duration,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            path: None,
            timeout,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Which probe to run against a target.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Http,
    Ping,
    Tunnel,
    QuotaBug,
}

/// Tunnel framing variant for the WebSocket handshake probe.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TunnelProtocol {
    Vmess,
    Trojan,
}

/// Why an HTTP-style probe considered the host down.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DownReason {
    ConnectionRefused,
    Timeout,
    TlsError,
    DnsError,
}

impl std::fmt::Display for DownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DownReason::ConnectionRefused => "connection refused",
            DownReason::Timeout => "timeout",
            DownReason::TlsError => "tls error",
            DownReason::DnsError => "dns error",
        };
        f.write_str(s)
    }
}

/// How far the tunnel handshake got.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TunnelValidation {
    Ok,
    UpgradeFailed,
    InvalidPayload,
}

/// Outcome of a single probe. `Up` means "produced an HTTP response", not
/// "healthy" — a 500 is still `Up` with that status code.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Up {
        status: u16,
        latency_ms: u64,
        resolved_ip: IpAddr,
    },
    Down {
        reason: DownReason,
        detail: String,
    },
    Ping {
        latency_ms: Option<u64>,
        used_fallback: bool,
        detail: String,
    },
    Tunnel {
        protocol: TunnelProtocol,
        reachable: bool,
        validation: TunnelValidation,
        detail: String,
    },
    QuotaBug {
        bypass_confirmed: bool,
        detail: String,
    },
}

impl ProbeOutcome {
    /// Measured round-trip latency, when the probe produced one.
    pub fn latency_ms(&self) -> Option<u64> {
        match self {
            ProbeOutcome::Up { latency_ms, .. } => Some(*latency_ms),
            ProbeOutcome::Ping { latency_ms, .. } => *latency_ms,
            _ => None,
        }
    }

    /// Short human-readable summary for table output.
    pub fn describe(&self) -> String {
        match self {
            ProbeOutcome::Up {
                status,
                latency_ms,
                resolved_ip,
            } => format!("up (HTTP {status}, {latency_ms} ms, {resolved_ip})"),
            ProbeOutcome::Down { reason, detail } => format!("down ({reason}): {detail}"),
            ProbeOutcome::Ping {
                latency_ms: Some(ms),
                used_fallback: false,
                ..
            } => format!("ping ok ({ms} ms)"),
            ProbeOutcome::Ping {
                latency_ms: Some(ms),
                used_fallback: true,
                ..
            } => format!("ping via https fallback ({ms} ms)"),
            ProbeOutcome::Ping {
                latency_ms: None,
                detail,
                ..
            } => format!("unreachable: {detail}"),
            ProbeOutcome::Tunnel {
                protocol,
                reachable: true,
                ..
            } => format!("{protocol:?} reachable"),
            ProbeOutcome::Tunnel {
                protocol,
                reachable: false,
                validation,
                detail,
            } => format!("{protocol:?} not reachable ({validation:?}): {detail}"),
            ProbeOutcome::QuotaBug {
                bypass_confirmed: true,
                detail,
            } => format!("bypass confirmed: {detail}"),
            ProbeOutcome::QuotaBug {
                bypass_confirmed: false,
                detail,
            } => format!("no bypass: {detail}"),
        }
    }
}

/// One finished probe. Created by the orchestrator, never mutated afterwards;
/// a re-scan produces a new record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeRecord {
    pub target: Target,
    pub kind: ProbeKind,
    pub outcome: ProbeOutcome,
    pub timestamp: String,
    pub elapsed_ms: u64,
}

/// Insertion-ordered aggregate for one scan pass: exactly one record per
/// (target, probe kind), in input order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub records: Vec<ProbeRecord>,
}

impl ScanReport {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
