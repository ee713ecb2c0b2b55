use std::sync::Arc;
use std::time::Duration;

use ::time::{format_description::well_known, OffsetDateTime};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tracing::warn;

use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::types::{
    DownReason, ProbeKind, ProbeOutcome, ProbeRecord, ScanReport, Target, TunnelValidation,
};
use crate::{http, ping, quota, tunnel};

/// Run one probe against one target and always come back with a record.
///
/// The probe future runs under the target's wall-clock budget; elapse
/// synthesizes the kind-appropriate timeout outcome, and probe-level errors
/// are folded through the taxonomy. Nothing propagates past here as `Err`.
pub async fn run_probe(target: &Target, kind: ProbeKind, config: &ProbeConfig) -> ProbeRecord {
    let timestamp = now_rfc3339();
    let start = Instant::now();

    let outcome = match time::timeout(target.timeout, dispatch(target, kind, config)).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => fold_error(kind, config, &err),
        Err(_) => timeout_outcome(kind, config, target.timeout),
    };

    ProbeRecord {
        target: target.clone(),
        kind,
        outcome,
        timestamp,
        elapsed_ms: start.elapsed().as_millis() as u64,
    }
}

/// Fan a probe out over a batch of targets with bounded concurrency.
///
/// - At most `config.concurrency` probes are in flight at once.
/// - One host's failure or timeout never cancels or delays the others.
/// - The report preserves the input order of `targets` regardless of
///   completion order: each worker writes into a pre-sized index slot.
pub async fn run_batch(targets: &[Target], kind: ProbeKind, config: &ProbeConfig) -> ScanReport {
    let sem = Arc::new(Semaphore::new(config.concurrency.clamp(1, 512)));
    let config = Arc::new(config.clone());
    let mut set = JoinSet::new();

    for (idx, target) in targets.iter().cloned().enumerate() {
        let permit = sem
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore in scope");
        let config = Arc::clone(&config);
        set.spawn(async move {
            let _permit = permit; // keep permit until task completes
            let record = run_probe(&target, kind, &config).await;
            (idx, record)
        });
    }

    let mut slots: Vec<Option<ProbeRecord>> = (0..targets.len()).map(|_| None).collect();
    while let Some(res) = set.join_next().await {
        match res {
            Ok((idx, record)) => slots[idx] = Some(record),
            Err(join_err) => warn!(%join_err, "probe worker crashed"),
        }
    }

    // A crashed worker still owes its slot a record; the aggregate never
    // silently drops a host.
    let records = slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| slot.unwrap_or_else(|| fault_record(&targets[idx], kind, &config)))
        .collect();
    ScanReport { records }
}

async fn dispatch(
    target: &Target,
    kind: ProbeKind,
    config: &ProbeConfig,
) -> Result<ProbeOutcome, ProbeError> {
    match kind {
        ProbeKind::Http => http::probe_http(target, config.prefer_tls).await,
        ProbeKind::Ping => ping::probe_ping(target).await,
        ProbeKind::Tunnel => tunnel::probe_tunnel(target, &config.tunnel).await,
        ProbeKind::QuotaBug => quota::probe_quota(target, &config.quota).await,
    }
}

fn fold_error(kind: ProbeKind, config: &ProbeConfig, err: &ProbeError) -> ProbeOutcome {
    warn!(%err, ?kind, "probe failed");
    let detail = err.to_string();
    match kind {
        ProbeKind::Http => ProbeOutcome::Down {
            reason: down_reason(err),
            detail,
        },
        ProbeKind::Ping => ProbeOutcome::Ping {
            latency_ms: None,
            used_fallback: false,
            detail,
        },
        ProbeKind::Tunnel => ProbeOutcome::Tunnel {
            protocol: config.tunnel.protocol,
            reachable: false,
            validation: TunnelValidation::UpgradeFailed,
            detail,
        },
        ProbeKind::QuotaBug => ProbeOutcome::QuotaBug {
            bypass_confirmed: false,
            detail,
        },
    }
}

fn down_reason(err: &ProbeError) -> DownReason {
    match err {
        ProbeError::Resolution { .. } => DownReason::DnsError,
        ProbeError::Tls(_) => DownReason::TlsError,
        ProbeError::Timeout(_) => DownReason::Timeout,
        _ => DownReason::ConnectionRefused,
    }
}

fn timeout_outcome(kind: ProbeKind, config: &ProbeConfig, budget: Duration) -> ProbeOutcome {
    let detail = format!("probe exceeded {budget:?}");
    match kind {
        ProbeKind::Http => ProbeOutcome::Down {
            reason: DownReason::Timeout,
            detail,
        },
        ProbeKind::Ping => ProbeOutcome::Ping {
            latency_ms: None,
            used_fallback: false,
            detail,
        },
        ProbeKind::Tunnel => ProbeOutcome::Tunnel {
            protocol: config.tunnel.protocol,
            reachable: false,
            validation: TunnelValidation::UpgradeFailed,
            detail,
        },
        ProbeKind::QuotaBug => ProbeOutcome::QuotaBug {
            bypass_confirmed: false,
            detail,
        },
    }
}

fn fault_record(target: &Target, kind: ProbeKind, config: &ProbeConfig) -> ProbeRecord {
    let err = ProbeError::Connection("internal probe fault".to_string());
    ProbeRecord {
        target: target.clone(),
        kind,
        outcome: fold_error(kind, config, &err),
        timestamp: now_rfc3339(),
        elapsed_ms: 0,
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
