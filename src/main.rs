use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use host_probe_rs::config::{default_denylist, ProbeConfig, QuotaOptions, TunnelOptions};
use host_probe_rs::report::{latency_view, write_json, LatencyPoint};
use host_probe_rs::types::{ProbeKind, ScanReport, Target, TunnelProtocol};
use host_probe_rs::{hosts, orchestrator};

/// host-probe-rs — async multi-protocol host reachability prober.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "host-probe-rs",
    version,
    about = "Probe hosts for reachability, tunnel handshakes, and quota-bypass behavior.",
    long_about = None
)]
struct Cli {
    /// Single host to probe (e.g., cdn.udemy.com). Mutually exclusive with --hosts-file.
    host: Option<String>,

    /// Path to a host list file (one host per line, `#` comments).
    #[arg(long)]
    hosts_file: Option<PathBuf>,

    /// Which probe to run.
    #[arg(long, value_enum, default_value = "http")]
    probe: ProbeKind,

    /// Target port.
    #[arg(long, default_value_t = 443)]
    port: u16,

    /// Per-host probe timeout in seconds.
    #[arg(long = "timeout-secs", default_value_t = 10)]
    timeout_secs: u64,

    /// Max concurrent probes during a batch run.
    #[arg(long, default_value_t = 10)]
    concurrency: usize,

    /// Try HTTPS first even on non-443 ports.
    #[arg(long, default_value_t = false)]
    prefer_tls: bool,

    /// Tunnel probe: protocol variant.
    #[arg(long, value_enum, default_value = "vmess")]
    tunnel_protocol: TunnelProtocol,

    /// Tunnel probe: VMESS UUID or TROJAN password.
    #[arg(long, default_value = "")]
    tunnel_id: String,

    /// Tunnel probe: WebSocket upgrade path.
    #[arg(long, default_value = "/")]
    tunnel_path: String,

    /// Tunnel probe: connect over wss (never silently downgraded).
    #[arg(long, default_value_t = false)]
    tunnel_tls: bool,

    /// Quota probe: Host header asserting the zero-rated access class.
    #[arg(long, default_value = "www.ruangguru.com")]
    quota_host_header: String,

    /// Quota probe: comma-separated redirect keywords treated as paywall/login.
    #[arg(long)]
    quota_denylist: Option<String>,

    /// Write results as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Render an ASCII latency chart after the scan.
    #[arg(long, default_value_t = false)]
    chart: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let host_list = match (&cli.host, &cli.hosts_file) {
        (Some(host), None) => {
            if !hosts::validate_host(host) {
                bail!("invalid host: {host}");
            }
            vec![host.clone()]
        }
        (None, Some(path)) => hosts::load_hosts_from_path(path)?,
        (Some(_), Some(_)) => bail!("pass either a host or --hosts-file, not both"),
        (None, None) => bail!("nothing to probe; pass a host or --hosts-file"),
    };

    let timeout = Duration::from_secs(cli.timeout_secs.max(1));
    let config = ProbeConfig {
        timeout,
        concurrency: cli.concurrency,
        prefer_tls: cli.prefer_tls,
        tunnel: TunnelOptions {
            protocol: cli.tunnel_protocol,
            identifier: cli.tunnel_id.clone(),
            path: cli.tunnel_path.clone(),
            use_tls: cli.tunnel_tls,
        },
        quota: QuotaOptions {
            host_header: cli.quota_host_header.clone(),
            denylist: cli
                .quota_denylist
                .as_deref()
                .map(|s| s.split(',').map(|kw| kw.trim().to_string()).collect())
                .unwrap_or_else(default_denylist),
        },
    };

    println!("host-probe-rs configuration:");
    println!("  probe        : {:?}", cli.probe);
    println!("  hosts        : {}", host_list.len());
    println!("  port         : {}", cli.port);
    println!("  timeout_secs : {}", cli.timeout_secs);
    println!("  concurrency  : {}", cli.concurrency);

    if cli.probe == ProbeKind::QuotaBug {
        println!(
            "note: the quota-bypass check is a best-effort heuristic, not proof of an exploitable misconfiguration."
        );
    }

    let targets: Vec<Target> = host_list
        .iter()
        .map(|h| {
            let t = Target::new(h.clone(), cli.port, timeout);
            if cli.probe == ProbeKind::Tunnel {
                t.with_path(cli.tunnel_path.clone())
            } else {
                t
            }
        })
        .collect();

    let report = orchestrator::run_batch(&targets, cli.probe, &config).await;
    print_report_table(&report);

    if cli.chart {
        print_latency_chart(&latency_view(&report));
    }

    if let Some(path) = cli.output.as_deref() {
        write_json(path, &report)?;
        println!("Wrote JSON results to {}", path.display());
    }

    Ok(())
}

fn print_report_table(report: &ScanReport) {
    let mut host_w = "host".len();
    for r in &report.records {
        host_w = host_w.max(r.target.host.len());
    }
    let lat_w = "latency_ms".len();

    println!("\nProbed {} host(s):", report.len());
    println!(
        "{:<host_w$}  {:>lat_w$}  {}",
        "host",
        "latency_ms",
        "outcome",
        host_w = host_w,
        lat_w = lat_w
    );
    println!(
        "{:-<host_w$}  {:-<lat_w$}  {:-<40}",
        "",
        "",
        "",
        host_w = host_w,
        lat_w = lat_w
    );
    for r in &report.records {
        let lat = r
            .outcome
            .latency_ms()
            .map(|ms| ms.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<host_w$}  {:>lat_w$}  {}",
            r.target.host,
            lat,
            r.outcome.describe(),
            host_w = host_w,
            lat_w = lat_w
        );
    }
}

/// ASCII latency chart: one bar glyph per 10 ms, capped at 50 glyphs.
/// Unreachable hosts keep their row and render a gap marker.
fn print_latency_chart(points: &[LatencyPoint]) {
    if points.is_empty() {
        println!("\nNo latency data to chart.");
        return;
    }
    const SCALE_MS: u64 = 10;
    const MAX_BAR: u64 = 50;

    let label_w = points
        .iter()
        .map(|p| p.host.len())
        .max()
        .unwrap_or(0)
        .max("host".len());
    let max_ms = points.iter().filter_map(|p| p.latency_ms).max().unwrap_or(0);

    println!(
        "\nResponse time chart (1 \u{2588} = {SCALE_MS} ms, max observed: {max_ms} ms)"
    );
    for p in points {
        match p.latency_ms {
            Some(ms) => {
                let bar_len = (ms / SCALE_MS).min(MAX_BAR) as usize;
                println!(
                    "{:<label_w$} | {:<bar_w$} {ms} ms",
                    p.host,
                    "\u{2588}".repeat(bar_len),
                    label_w = label_w,
                    bar_w = MAX_BAR as usize
                );
            }
            None => println!(
                "{:<label_w$} | {:<bar_w$} (unreachable)",
                p.host,
                "--",
                label_w = label_w,
                bar_w = MAX_BAR as usize
            ),
        }
    }
}
