//! Client IP and edge-country extraction from HTTP headers
//!
//! Forwarding headers are only honoured when the configured proxy mode says
//! the hop in front of us sets them; otherwise the socket address is used.

use axum::http::HeaderMap;
use std::net::IpAddr;
use tracing::warn;

use crate::config::TrustedProxyMode;

/// Extract the client IP address according to the proxy trust mode
pub fn extract_client_ip(headers: &HeaderMap, socket_addr: IpAddr, mode: TrustedProxyMode) -> IpAddr {
    match mode {
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).unwrap_or_else(|| {
            warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            socket_addr
        }),
        TrustedProxyMode::Standard => extract_from_x_forwarded_for(headers).unwrap_or(socket_addr),
        TrustedProxyMode::None => socket_addr,
    }
}

/// Country code resolved by the edge, if the edge is trusted to send one
pub fn edge_country(headers: &HeaderMap, mode: TrustedProxyMode) -> Option<String> {
    if mode != TrustedProxyMode::Cloudflare {
        return None;
    }

    headers
        .get("cf-ipcountry")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        // XX: unknown, T1: Tor exit node
        .filter(|code| !code.is_empty() && *code != "XX" && *code != "T1")
        .map(str::to_uppercase)
}

fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// The rightmost entry is the address seen by the single trusted proxy
fn extract_from_x_forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;

    xff.split(',')
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .next_back()
}
