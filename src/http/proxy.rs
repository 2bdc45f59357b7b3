//! Proxy detection and client address resolution
//!
//! Intermediaries announce the address they received a request from in
//! headers such as `Forwarded` or `X-Forwarded-For`. Those headers are
//! written by whoever sent the request, so the resolved address is a hint:
//! a client can forge it, and transparent proxies add nothing at all.

use super::config::ProxyConfig;
use super::headers::unquote;
use super::Headers;
use std::net::{IpAddr, SocketAddr};

/// The original client address claimed by the first trusted header that
/// carries a parseable one
pub fn claimed_client_ip(headers: &Headers, config: &ProxyConfig) -> Option<IpAddr> {
    config.headers().find_map(|name| {
        headers.get_all(name).into_iter().find_map(|value| {
            if name.eq_ignore_ascii_case("Forwarded") {
                forwarded_for(value)
            } else {
                first_address(value)
            }
        })
    })
}

/// Resolve the best-effort original client address
pub fn real_client_ip(peer: IpAddr, headers: &Headers, config: &ProxyConfig) -> IpAddr {
    claimed_client_ip(headers, config).unwrap_or(peer)
}

/// True iff a trusted header claims an address different from the peer
pub fn is_proxied(peer: IpAddr, headers: &Headers, config: &ProxyConfig) -> bool {
    claimed_client_ip(headers, config).is_some_and(|claimed| claimed != peer)
}

/// First `for=` address of an RFC 7239 `Forwarded` header
fn forwarded_for(value: &str) -> Option<IpAddr> {
    value
        .split(',')
        .flat_map(|element| element.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .filter(|(name, _)| name.trim().eq_ignore_ascii_case("for"))
        .find_map(|(_, node)| parse_node(node))
}

/// First parseable entry of a comma-separated address list
fn first_address(value: &str) -> Option<IpAddr> {
    value.split(',').find_map(parse_node)
}

/// Parse `1.2.3.4`, `1.2.3.4:80`, `[::1]:80`, `"[::1]"` or `::1`
fn parse_node(node: &str) -> Option<IpAddr> {
    let node = unquote(node.trim());
    if let Ok(ip) = node.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Ok(addr) = node.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    node.strip_prefix('[')
        .and_then(|rest| rest.split_once(']'))
        .and_then(|(ip, _)| ip.parse().ok())
}
