//! Candidate address space for subnet sweeps
//!
//! A sweep covers hosts 1..=254 of each configured /24 prefix on one port.
//! Addresses are produced lazily so a cancelled scan stops drawing
//! candidates without ever materializing the full list.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use super::DiscoveryError;

/// Prefixes tried when none are configured: common home router ranges plus
/// the Android and iOS hotspot subnets
pub const DEFAULT_PREFIXES: &[[u8; 3]] = &[
    [192, 168, 0],
    [192, 168, 1],
    [192, 168, 43],
    [10, 0, 0],
    [172, 20, 10],
];

const HOSTS_PER_PREFIX: usize = 254;

/// The set of addresses a sweep will probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSpace {
    prefixes: Vec<[u8; 3]>,
    port: u16,
}

impl CandidateSpace {
    /// Create a space over `prefixes`, dropping duplicates but keeping order
    pub fn new(prefixes: impl IntoIterator<Item = [u8; 3]>, port: u16) -> Self {
        let mut unique: Vec<[u8; 3]> = Vec::new();
        for prefix in prefixes {
            if !unique.contains(&prefix) {
                unique.push(prefix);
            }
        }
        Self {
            prefixes: unique,
            port,
        }
    }

    /// Default prefixes, with the host's own subnet first when it can be found
    pub fn default_for_port(port: u16) -> Self {
        let local = local_ipv4().map(prefix_of);
        Self::new(local.into_iter().chain(DEFAULT_PREFIXES.iter().copied()), port)
    }

    /// Parse prefixes such as `192.168.1`, `192.168.1.0/24` or `10.0.0.x`
    pub fn from_prefix_strs<S: AsRef<str>>(prefixes: &[S], port: u16) -> Result<Self, DiscoveryError> {
        let parsed = prefixes
            .iter()
            .map(|p| parse_prefix(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(parsed, port))
    }

    /// Configured prefixes
    pub fn prefixes(&self) -> &[[u8; 3]] {
        &self.prefixes
    }

    /// Target port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Number of candidates in the space
    pub fn len(&self) -> usize {
        self.prefixes.len() * HOSTS_PER_PREFIX
    }

    /// Whether the space is empty
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Lazily enumerate every candidate address
    pub fn iter(&self) -> impl Iterator<Item = SocketAddrV4> + Send + 'static {
        let port = self.port;
        self.prefixes.clone().into_iter().flat_map(move |[a, b, c]| {
            (1..=HOSTS_PER_PREFIX as u8).map(move |host| SocketAddrV4::new(Ipv4Addr::new(a, b, c, host), port))
        })
    }
}

/// /24 prefix of an address
pub fn prefix_of(ip: Ipv4Addr) -> [u8; 3] {
    let [a, b, c, _] = ip.octets();
    [a, b, c]
}

/// Parse a /24 prefix
pub fn parse_prefix(input: &str) -> Result<[u8; 3], DiscoveryError> {
    let invalid = || DiscoveryError::InvalidPrefix(input.to_string());

    let trimmed = input.trim();
    let body = trimmed.strip_suffix("/24").unwrap_or(trimmed);
    let parts: Vec<&str> = body.split('.').collect();

    match parts.len() {
        3 => {}
        4 if matches!(parts[3], "0" | "x" | "*") => {}
        _ => return Err(invalid()),
    }

    let mut prefix = [0u8; 3];
    for (slot, part) in prefix.iter_mut().zip(&parts) {
        *slot = part.parse().map_err(|_| invalid())?;
    }
    Ok(prefix)
}

/// Best-effort IPv4 address of the interface used for outbound traffic
///
/// Connecting a UDP socket sends no packets; it only selects a route.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("192.0.2.1:80").ok()?;
    match socket.local_addr().ok()?.ip() {
        std::net::IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefix() {
        assert_eq!(parse_prefix("192.168.1").unwrap(), [192, 168, 1]);
        assert_eq!(parse_prefix("192.168.1.0/24").unwrap(), [192, 168, 1]);
        assert_eq!(parse_prefix(" 10.0.0.x ").unwrap(), [10, 0, 0]);
        assert!(parse_prefix("192.168").is_err());
        assert!(parse_prefix("192.168.1.7").is_err());
        assert!(parse_prefix("300.1.1").is_err());
    }

    #[test]
    fn test_space_enumeration() {
        let space = CandidateSpace::new([[192, 168, 1], [10, 0, 0]], 3000);
        assert_eq!(space.len(), 508);

        let all: Vec<_> = space.iter().collect();
        assert_eq!(all.len(), 508);
        assert_eq!(all[0].to_string(), "192.168.1.1:3000");
        assert_eq!(all[253].to_string(), "192.168.1.254:3000");
        assert_eq!(all[254].to_string(), "10.0.0.1:3000");
    }

    #[test]
    fn test_space_dedups_prefixes() {
        let space = CandidateSpace::from_prefix_strs(&["192.168.1", "192.168.1.0/24"], 3000).unwrap();
        assert_eq!(space.prefixes(), &[[192, 168, 1]]);
    }

    #[test]
    fn test_iteration_is_lazy() {
        let space = CandidateSpace::new(DEFAULT_PREFIXES.iter().copied(), 3000);
        let first: Vec<_> = space.iter().take(3).collect();
        assert_eq!(first.len(), 3);
        assert_eq!(first[2].ip().octets()[3], 3);
    }

    #[test]
    fn test_default_space_contains_defaults() {
        let space = CandidateSpace::default_for_port(3000);
        for prefix in DEFAULT_PREFIXES {
            assert!(space.prefixes().contains(prefix));
        }
    }
}
