use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::{ProbeKind, ScanReport};

/// One chart row: a host and its measured latency, or an explicit gap.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LatencyPoint {
    pub host: String,
    pub latency_ms: Option<u64>,
}

/// Reduce a report to (host, latency) pairs for the chart collaborator.
///
/// Only HTTP and Ping records carry chartable latencies. Hosts that timed out
/// or were unreachable appear with `latency_ms: None` — the chart renders a
/// gap instead of skipping the row.
pub fn latency_view(report: &ScanReport) -> Vec<LatencyPoint> {
    report
        .records
        .iter()
        .filter(|r| matches!(r.kind, ProbeKind::Http | ProbeKind::Ping))
        .map(|r| LatencyPoint {
            host: r.target.host.clone(),
            latency_ms: r.outcome.latency_ms(),
        })
        .collect()
}

/// Write the aggregate as pretty JSON for the persistence collaborator.
pub fn write_json(path: &Path, report: &ScanReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create results file: {}", path.display()))?;
    serde_json::to_writer_pretty(file, report).context("failed to serialize scan report")?;
    Ok(())
}
