use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async_tls_with_config, Connector};
use tracing::{debug, warn};

use crate::config::TunnelOptions;
use crate::error::ProbeError;
use crate::types::{ProbeOutcome, Target, TunnelProtocol, TunnelValidation};

/// WebSocket tunnel-handshake probe for VMESS and TROJAN endpoints.
///
/// Establishes a WebSocket upgrade to the target path (`wss` when
/// `use_tls` — there is no silent downgrade to `ws`). VMESS then sends a
/// minimal JSON handshake frame carrying the identifier and requires the
/// first reply frame to parse as a JSON object; TROJAN framing is opaque
/// binary, so a successful upgrade alone counts as reachable.
///
/// Handshake failures of any flavor fold into `reachable = false`; they never
/// surface as errors to the caller. The only `Err` path is identifier
/// validation, which rejects the probe before any traffic is sent.
pub async fn probe_tunnel(target: &Target, opts: &TunnelOptions) -> Result<ProbeOutcome, ProbeError> {
    validate_identifier(opts)?;

    let scheme = if opts.use_tls { "wss" } else { "ws" };
    let path = target.path.as_deref().unwrap_or(&opts.path);
    let url = format!("{scheme}://{}:{}{path}", target.host, target.port);

    let mut request = url
        .clone()
        .into_client_request()
        .map_err(|e| ProbeError::Connection(e.to_string()))?;
    let header_value = match opts.protocol {
        TunnelProtocol::Vmess => format!("v2ray.vmess.{}", opts.identifier),
        TunnelProtocol::Trojan => opts.identifier.clone(),
    };
    let header_name = match opts.protocol {
        TunnelProtocol::Vmess => "Sec-WebSocket-Protocol",
        TunnelProtocol::Trojan => "Trojan-Password",
    };
    request.headers_mut().insert(
        header_name,
        header_value
            .parse()
            .map_err(|_| ProbeError::ProtocolValidation("identifier is not a valid header value".to_string()))?,
    );

    let connector = if opts.use_tls {
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| ProbeError::Tls(e.to_string()))?;
        Some(Connector::NativeTls(tls))
    } else {
        Some(Connector::Plain)
    };

    let (mut ws, response) = match connect_async_tls_with_config(request, None, false, connector).await {
        Ok(pair) => pair,
        Err(err) => return Ok(upgrade_failure(opts.protocol, &url, err)),
    };
    debug!(%url, status = response.status().as_u16(), "websocket upgrade accepted");

    match opts.protocol {
        TunnelProtocol::Trojan => {
            // Trojan replies are opaque binary; the upgrade is the whole
            // signal. The identifier still goes out for symmetry with real
            // clients, failures past this point don't change the verdict.
            let _ = ws.send(Message::text(opts.identifier.clone())).await;
            let _ = ws.close(None).await;
            Ok(ProbeOutcome::Tunnel {
                protocol: TunnelProtocol::Trojan,
                reachable: true,
                validation: TunnelValidation::Ok,
                detail: "websocket upgrade accepted".to_string(),
            })
        }
        TunnelProtocol::Vmess => {
            let hello = serde_json::json!({
                "v": "2",
                "id": opts.identifier,
                "op": "ping",
            })
            .to_string();
            if let Err(err) = ws.send(Message::text(hello)).await {
                return Ok(vmess_invalid(format!("connection closed before handshake frame was sent: {err}")));
            }

            let verdict = match ws.next().await {
                Some(Ok(msg)) if msg.is_close() => {
                    vmess_invalid("peer closed without a reply frame".to_string())
                }
                Some(Ok(msg)) => match msg.to_text() {
                    Ok(text) if is_json_envelope(text) => ProbeOutcome::Tunnel {
                        protocol: TunnelProtocol::Vmess,
                        reachable: true,
                        validation: TunnelValidation::Ok,
                        detail: "well-formed json envelope received".to_string(),
                    },
                    Ok(_) => vmess_invalid("reply frame is not a json envelope".to_string()),
                    Err(_) => vmess_invalid("reply frame is not valid utf-8".to_string()),
                },
                Some(Err(err)) => vmess_invalid(format!("transport error awaiting reply: {err}")),
                None => vmess_invalid("stream ended without a reply frame".to_string()),
            };
            let _ = ws.close(None).await;
            Ok(verdict)
        }
    }
}

/// A well-formed VMESS reply is a JSON object; bare scalars are
/// indistinguishable from line noise.
fn is_json_envelope(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .map(|v| v.is_object())
        .unwrap_or(false)
}

fn vmess_invalid(detail: String) -> ProbeOutcome {
    ProbeOutcome::Tunnel {
        protocol: TunnelProtocol::Vmess,
        reachable: false,
        validation: TunnelValidation::InvalidPayload,
        detail,
    }
}

fn upgrade_failure(protocol: TunnelProtocol, url: &str, err: WsError) -> ProbeOutcome {
    let detail = match &err {
        WsError::Http(resp) => format!("upgrade rejected with HTTP {}", resp.status().as_u16()),
        other => format!("websocket upgrade failed: {other}"),
    };
    warn!(%url, %detail, "tunnel upgrade failed");
    ProbeOutcome::Tunnel {
        protocol,
        reachable: false,
        validation: TunnelValidation::UpgradeFailed,
        detail,
    }
}

fn validate_identifier(opts: &TunnelOptions) -> Result<(), ProbeError> {
    match opts.protocol {
        TunnelProtocol::Vmess if !is_canonical_uuid(&opts.identifier) => {
            Err(ProbeError::ProtocolValidation(
                "vmess identifier must be a canonical lowercase-hex uuid".to_string(),
            ))
        }
        TunnelProtocol::Trojan if opts.identifier.len() < 8 => {
            Err(ProbeError::ProtocolValidation(
                "trojan password must be at least 8 characters".to_string(),
            ))
        }
        _ => Ok(()),
    }
}

/// Canonical 8-4-4-4-12 lowercase-hex UUID.
fn is_canonical_uuid(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != 5 {
        return false;
    }
    const LENS: [usize; 5] = [8, 4, 4, 4, 12];
    parts.iter().zip(LENS).all(|(part, len)| {
        part.len() == len
            && part
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    })
}
