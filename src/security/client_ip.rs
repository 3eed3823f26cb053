//! Client address resolution behind reverse proxies.
//!
//! When proxies are trusted, a peer on a loopback, link-local or unique-local
//! address is treated as a proxy. The client is then the right-most
//! `X-Forwarded-For` hop that is not itself such an address.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request},
};

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Address of the client that sent `req`, if the peer is known.
pub fn client_ip(req: &Request<Body>, trust_proxies: bool) -> Option<IpAddr> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    resolve(peer, req.headers(), trust_proxies)
}

pub fn resolve(peer: Option<IpAddr>, headers: &HeaderMap, trust_proxies: bool) -> Option<IpAddr> {
    let peer = peer?;
    if !trust_proxies || !is_trusted_proxy(peer) {
        return Some(peer);
    }

    let hops: Vec<IpAddr> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|hop| hop.trim().parse().ok())
        .collect();

    hops.iter()
        .rev()
        .find(|hop| !is_trusted_proxy(**hop))
        .or_else(|| hops.first())
        .copied()
        .or(Some(peer))
}

pub fn is_trusted_proxy(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_local_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_local_v4(v4),
            None => is_local_v6(v6),
        },
    }
}

fn is_local_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_link_local() || ip.is_private()
}

fn is_local_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    // fc00::/7 unique-local, fe80::/10 link-local
    ip.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
}
