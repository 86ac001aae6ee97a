// X-Forwarded-For is only honoured when the peer is a trusted proxy

use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

pub const UNKNOWN_CLIENT: &str = "unknown";
const FORWARDED_FOR: &str = "x-forwarded-for";

pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>, trusted_proxies: &[IpAddr]) -> String {
    let Some(peer) = peer else {
        return UNKNOWN_CLIENT.to_string();
    };
    let peer_ip = peer.ip().to_canonical();

    if trusted_proxies.contains(&peer_ip) {
        if let Some(forwarded) = forwarded_client(headers, trusted_proxies) {
            return forwarded;
        }
    }

    peer_ip.to_string()
}

pub fn from_request(req: &Request, trusted_proxies: &[IpAddr]) -> String {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    resolve(req.headers(), peer, trusted_proxies)
}

// Proxies append to X-Forwarded-For, so only the hops added by our own
// proxies can be trusted: the client is the rightmost hop that isn't one.
fn forwarded_client(headers: &HeaderMap, trusted_proxies: &[IpAddr]) -> Option<String> {
    let value = headers.get(FORWARDED_FOR)?.to_str().ok()?;
    value
        .rsplit(',')
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .find(|hop| !is_trusted(hop, trusted_proxies))
        .map(str::to_string)
}

fn is_trusted(hop: &str, trusted_proxies: &[IpAddr]) -> bool {
    hop.parse::<IpAddr>()
        .is_ok_and(|ip| trusted_proxies.contains(&ip.to_canonical()))
}
