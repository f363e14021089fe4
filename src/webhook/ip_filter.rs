//! Sender address resolution and allowlisting
//!
//! `X-Forwarded-For` is only read when the socket peer is a configured trusted
//! proxy. The header is then walked right to left, skipping trusted hops, and
//! the first untrusted address is the sender. Any other peer is taken as the
//! sender itself.

use std::net::{IpAddr, SocketAddr};

use http::HeaderMap;

/// Header set by reverse proxies
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

// =============================================================================
// Client address
// =============================================================================

/// Resolve the sender address for a delivery from `peer`.
///
/// Returns `None` when there is no peer address.
pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted_proxies: &[IpAddr],
) -> Option<IpAddr> {
    let peer_ip = peer.map(|p| p.ip())?;
    if !trusted_proxies.contains(&peer_ip) {
        return Some(peer_ip);
    }
    Some(forwarded_client(headers, trusted_proxies).unwrap_or(peer_ip))
}

fn forwarded_client(headers: &HeaderMap, trusted_proxies: &[IpAddr]) -> Option<IpAddr> {
    let hops: Vec<&str> = headers
        .get_all(FORWARDED_FOR_HEADER)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    for hop in hops.iter().rev() {
        // A malformed hop means the chain cannot be trusted past this point
        let ip: IpAddr = hop.parse().ok()?;
        if !trusted_proxies.contains(&ip) {
            return Some(ip);
        }
    }
    hops.first().and_then(|hop| hop.parse().ok())
}

// =============================================================================
// IP Filter
// =============================================================================

/// Allowlist for webhook senders
///
/// An empty list admits everyone. Loopback addresses are always admitted.
#[derive(Debug, Clone, Default)]
pub struct IpFilter {
    allowed_ips: Vec<IpAddr>,
}

impl IpFilter {
    /// Filter admitting only `allowed_ips` (plus loopback); empty admits all
    pub fn new(allowed_ips: Vec<IpAddr>) -> Self {
        Self { allowed_ips }
    }

    /// Filter that admits every sender
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Whether an allowlist is configured
    pub fn is_enabled(&self) -> bool {
        !self.allowed_ips.is_empty()
    }

    /// Check a resolved sender. An unknown sender only passes when the filter
    /// is disabled.
    pub fn is_allowed(&self, ip: Option<IpAddr>) -> bool {
        if !self.is_enabled() {
            return true;
        }
        match ip {
            Some(ip) => ip.is_loopback() || self.allowed_ips.contains(&ip),
            None => false,
        }
    }

    /// Add an allowed IP
    pub fn allow_ip(&mut self, ip: IpAddr) {
        if !self.allowed_ips.contains(&ip) {
            self.allowed_ips.push(ip);
        }
    }

    /// Configured addresses
    pub fn allowed_ips(&self) -> &[IpAddr] {
        &self.allowed_ips
    }
}
