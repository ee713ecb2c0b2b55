use std::time::Duration;

use thiserror::Error;

/// Probe-level failure taxonomy. Every variant is caught at the orchestrator
/// boundary and folded into a `ProbeOutcome`; none escape `run_probe`.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("dns resolution failed for {host}: {detail}")]
    Resolution { host: String, detail: String },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("tls negotiation failed: {0}")]
    Tls(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("protocol validation failed: {0}")]
    ProtocolValidation(String),

    #[error("inconclusive response: {0}")]
    HeuristicInconclusive(String),
}
