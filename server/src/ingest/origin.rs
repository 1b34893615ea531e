//! Origin resolution for inbound webhook calls.

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;
use std::net::SocketAddr;

const UNKNOWN: &str = "unknown";

/// Best-effort origin of a call: `(source, ip)`.
///
/// `source` is the raw X-Forwarded-For chain when present, otherwise the peer
/// address. `ip` is the first forwarded hop, then X-Real-IP, then the peer.
pub fn resolve_origin(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> (String, String) {
    let peer = connect_info.map(|c| c.0.ip().to_string());
    let forwarded = header_str(headers, "X-Forwarded-For");

    let ip = forwarded
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .or_else(|| header_str(headers, "X-Real-IP").map(str::trim))
        .map(str::to_string)
        .or_else(|| peer.clone())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let source = forwarded
        .map(str::to_string)
        .or(peer)
        .unwrap_or_else(|| UNKNOWN.to_string());

    (source, ip)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
}
