//! Client IP resolution from trusted-proxy headers, per §3 / §4.7.
//!
//! `X-Forwarded-For[0]`, `X-Real-IP`, and `CF-Connecting-IP` are trusted only
//! when the value is a valid IPv4 address that does *not* fall in a
//! configured private range; otherwise the gateway falls back to the socket
//! peer address. Grounded on `ipnet`'s `Ipv4Net` range containment check,
//! the same pattern used for trusted-proxy filtering in the wider example
//! pack's gateway-shaped services.

use ipnet::Ipv4Net;
use std::net::{IpAddr, Ipv4Addr};

/// Parsed private-range filter, built once from `Settings::trusted_proxy`.
#[derive(Debug, Clone)]
pub struct PrivateRangeFilter {
    ranges: Vec<Ipv4Net>,
}

impl PrivateRangeFilter {
    pub fn new(cidrs: &[String]) -> Result<Self, String> {
        let mut ranges = Vec::with_capacity(cidrs.len());
        for cidr in cidrs {
            let net: Ipv4Net = cidr
                .parse()
                .map_err(|e| format!("invalid private-range CIDR '{cidr}': {e}"))?;
            ranges.push(net);
        }
        Ok(Self { ranges })
    }

    pub fn is_private(&self, addr: Ipv4Addr) -> bool {
        self.ranges.iter().any(|net| net.contains(&addr))
    }
}

/// Resolves the client IP for a request given the candidate header values
/// (in trust-preference order: `X-Forwarded-For[0]`, `X-Real-IP`,
/// `CF-Connecting-IP`) and the raw socket peer address.
///
/// A candidate is accepted only if it parses as IPv4 and is not covered by
/// `filter`. The first acceptable candidate wins; if none qualify, the
/// socket peer address is used unchanged (it may be IPv6).
pub fn resolve_client_ip(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    cf_connecting_ip: Option<&str>,
    socket_peer: IpAddr,
    filter: &PrivateRangeFilter,
) -> IpAddr {
    let first_forwarded = forwarded_for.and_then(|v| v.split(',').next()).map(str::trim);

    for candidate in [first_forwarded, real_ip, cf_connecting_ip].into_iter().flatten() {
        if let Ok(v4) = candidate.parse::<Ipv4Addr>() {
            if !filter.is_private(v4) {
                return IpAddr::V4(v4);
            }
        }
    }

    socket_peer
}
