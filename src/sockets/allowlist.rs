/*!
 * Authority Allow-List
 * Host:port access rules checked before any native network call
 *
 * Pattern grammar:
 * - `*` or `*:*` allows everything
 * - `host:port`, `host:*`, `*.domain:port` match host names or literal IPs
 * - `10.0.0.0/8:*`, `[fd00::/8]:443` match CIDR blocks
 * - a leading `!` turns any host rule into a block rule
 *
 * Block rules win over allows. An empty list denies everything.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("invalid authority pattern '{pattern}': {reason}")]
pub struct AuthorityParseError {
    pub pattern: String,
    pub reason: String,
}

impl AuthorityParseError {
    fn new(pattern: &str, reason: impl Into<String>) -> Self {
        Self {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

/// One parsed allow-list entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum AuthorityRule {
    AllowAll,
    AllowHost { host: String, port: Option<u16> },
    AllowCidr { network: IpAddr, prefix: u8, port: Option<u16> },
    BlockHost { host: String, port: Option<u16> },
}

impl AuthorityRule {
    pub fn parse(pattern: &str) -> Result<Self, AuthorityParseError> {
        let trimmed = pattern.trim();
        if trimmed == "*" || trimmed == "*:*" {
            return Ok(Self::AllowAll);
        }
        let (blocked, body) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (host, port) = split_authority(body).ok_or_else(|| {
            AuthorityParseError::new(pattern, "expected host:port")
        })?;
        if host.is_empty() {
            return Err(AuthorityParseError::new(pattern, "empty host"));
        }
        let port = parse_port(port).ok_or_else(|| AuthorityParseError::new(pattern, "bad port"))?;

        if let Some((network, prefix)) = host.split_once('/') {
            if blocked {
                return Err(AuthorityParseError::new(pattern, "CIDR blocks cannot be negated"));
            }
            let network: IpAddr = network
                .parse()
                .map_err(|_| AuthorityParseError::new(pattern, "bad network address"))?;
            let prefix: u8 = prefix
                .parse()
                .map_err(|_| AuthorityParseError::new(pattern, "bad prefix length"))?;
            let max = if network.is_ipv4() { 32 } else { 128 };
            if prefix > max {
                return Err(AuthorityParseError::new(pattern, "prefix length out of range"));
            }
            let (network, prefix) = canonical_network(network, prefix);
            return Ok(Self::AllowCidr {
                network,
                prefix,
                port,
            });
        }

        let host = host.to_ascii_lowercase();
        Ok(if blocked {
            Self::BlockHost { host, port }
        } else {
            Self::AllowHost { host, port }
        })
    }
}

impl fmt::Display for AuthorityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn port(p: &Option<u16>) -> String {
            p.map_or_else(|| "*".to_string(), |p| p.to_string())
        }
        match self {
            Self::AllowAll => f.write_str("*:*"),
            Self::AllowHost { host, port: p } => write!(f, "{}:{}", bracket(host), port(p)),
            Self::AllowCidr {
                network,
                prefix,
                port: p,
            } => match network {
                IpAddr::V4(_) => write!(f, "{network}/{prefix}:{}", port(p)),
                IpAddr::V6(_) => write!(f, "[{network}/{prefix}]:{}", port(p)),
            },
            Self::BlockHost { host, port: p } => write!(f, "!{}:{}", bracket(host), port(p)),
        }
    }
}

fn bracket(host: &str) -> String {
    if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

/// Split `host:port` or `[v6]:port`
fn split_authority(body: &str) -> Option<(&str, &str)> {
    if let Some(rest) = body.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = tail.strip_prefix(':')?;
        return Some((host, port));
    }
    body.rsplit_once(':')
}

/// `*` yields `Some(None)`; garbage yields `None`
fn parse_port(port: &str) -> Option<Option<u16>> {
    if port == "*" {
        return Some(None);
    }
    port.parse::<u16>().ok().map(Some)
}

/// Immutable, ordered set of authority rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityAllowList {
    rules: Vec<AuthorityRule>,
}

impl AuthorityAllowList {
    pub fn new(rules: Vec<AuthorityRule>) -> Self {
        Self { rules }
    }

    /// List that permits every destination
    pub fn allow_all() -> Self {
        Self::new(vec![AuthorityRule::AllowAll])
    }

    pub fn parse<I, S>(patterns: I) -> Result<Self, AuthorityParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        patterns
            .into_iter()
            .map(|p| AuthorityRule::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    #[inline]
    pub fn rules(&self) -> &[AuthorityRule] {
        &self.rules
    }

    /// Whether a socket address may be bound or connected to
    pub fn permits_addr(&self, addr: &SocketAddr) -> bool {
        self.permits_ip(addr.ip(), addr.port())
    }

    pub fn permits_ip(&self, ip: IpAddr, port: u16) -> bool {
        self.check(&Target::Ip(canonical_ip(ip)), port)
    }

    /// Whether `host:port` may be contacted
    pub fn permits(&self, host: &str, port: u16) -> bool {
        self.check(&Target::parse(host), port)
    }

    fn check(&self, target: &Target, port: u16) -> bool {
        if self.rules.is_empty() {
            return false;
        }

        // Blocks have the highest priority
        for rule in &self.rules {
            if let AuthorityRule::BlockHost {
                host: pattern,
                port: blocked,
            } = rule
            {
                if host_matches(target, pattern) && port_matches(port, *blocked) {
                    return false;
                }
            }
        }

        self.rules.iter().any(|rule| match rule {
            AuthorityRule::AllowAll => true,
            AuthorityRule::AllowHost {
                host: pattern,
                port: allowed,
            } => host_matches(target, pattern) && port_matches(port, *allowed),
            AuthorityRule::AllowCidr {
                network,
                prefix,
                port: allowed,
            } => port_matches(port, *allowed) && cidr_contains(*network, *prefix, target),
            AuthorityRule::BlockHost { .. } => false,
        })
    }
}

/// Destination as rules see it: a canonical address or a lowercase name
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Ip(IpAddr),
    Name(String),
}

impl Target {
    fn parse(host: &str) -> Self {
        let host = host.trim_start_matches('[').trim_end_matches(']');
        match host.parse::<IpAddr>() {
            Ok(ip) => Self::Ip(canonical_ip(ip)),
            Err(_) => Self::Name(host.trim_end_matches('.').to_ascii_lowercase()),
        }
    }
}

/// IPv4-mapped IPv6 addresses compare as their IPv4 form
fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
        IpAddr::V4(_) => ip,
    }
}

fn canonical_network(network: IpAddr, prefix: u8) -> (IpAddr, u8) {
    match canonical_ip(network) {
        IpAddr::V4(v4) if network.is_ipv6() && prefix >= 96 => (IpAddr::V4(v4), prefix - 96),
        _ => (network, prefix),
    }
}

fn host_matches(target: &Target, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match (target, Target::parse(pattern)) {
        (Target::Ip(ip), Target::Ip(rule)) => *ip == rule,
        (Target::Name(name), Target::Name(rule)) => {
            if *name == rule {
                return true;
            }
            // "*.example.com" matches "api.example.com" but not "example.com"
            match rule.strip_prefix('*') {
                Some(domain) if domain.starts_with('.') => {
                    name.ends_with(domain) && name.len() > domain.len()
                }
                _ => false,
            }
        }
        _ => false,
    }
}

#[inline]
fn port_matches(port: u16, pattern: Option<u16>) -> bool {
    pattern.map_or(true, |p| p == port)
}

fn cidr_contains(network: IpAddr, prefix: u8, target: &Target) -> bool {
    let Target::Ip(host) = target else {
        return false;
    };
    match (network, *host) {
        (IpAddr::V4(net), IpAddr::V4(host)) => {
            let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - u32::from(prefix)) };
            (u32::from(net) & mask) == (u32::from(host) & mask)
        }
        (IpAddr::V6(net), IpAddr::V6(host)) => {
            let mask = if prefix == 0 { 0 } else { u128::MAX << (128 - u32::from(prefix)) };
            (u128::from(net) & mask) == (u128::from(host) & mask)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(patterns: &[&str]) -> AuthorityAllowList {
        AuthorityAllowList::parse(patterns).unwrap()
    }

    #[test]
    fn test_empty_denies() {
        assert!(!AuthorityAllowList::default().permits("example.com", 80));
    }

    #[test]
    fn test_allow_all() {
        assert!(list(&["*"]).permits("example.com", 80));
        assert!(list(&["*:*"]).permits("10.1.2.3", 1));
    }

    #[test]
    fn test_specific_host() {
        let rules = list(&["example.com:443"]);
        assert!(rules.permits("example.com", 443));
        assert!(rules.permits("EXAMPLE.com", 443));
        assert!(!rules.permits("example.com", 80));
    }

    #[test]
    fn test_wildcard_domain() {
        let rules = list(&["*.example.com:*"]);
        assert!(rules.permits("api.example.com", 443));
        assert!(!rules.permits("example.com", 443));
        assert!(!rules.permits("other.com", 443));
    }

    #[test]
    fn test_cidr() {
        let rules = list(&["192.168.1.0/24:*", "[fd00::/8]:443"]);
        assert!(rules.permits("192.168.1.100", 9));
        assert!(!rules.permits("192.168.2.100", 9));
        assert!(rules.permits("fd12::1", 443));
        assert!(!rules.permits("fd12::1", 80));
        assert!(list(&["0.0.0.0/0:*"]).permits("8.8.8.8", 53));
    }

    #[test]
    fn test_block_wins() {
        let rules = list(&["*", "!metadata.internal:*"]);
        assert!(!rules.permits("metadata.internal", 80));
        assert!(rules.permits("example.com", 80));
    }

    #[test]
    fn test_socket_addr() {
        let rules = list(&["127.0.0.1:*", "[::1]:8080"]);
        assert!(rules.permits_addr(&"127.0.0.1:4000".parse().unwrap()));
        assert!(rules.permits_addr(&"[::1]:8080".parse().unwrap()));
        assert!(!rules.permits_addr(&"[::1]:8081".parse().unwrap()));
    }

    #[test]
    fn test_mapped_addresses_match_ipv4_rules() {
        let rules = list(&["*", "!10.0.0.1:*"]);
        assert!(!rules.permits_addr(&"10.0.0.1:80".parse().unwrap()));
        assert!(!rules.permits_addr(&"[::ffff:10.0.0.1]:80".parse().unwrap()));
        assert!(!rules.permits("[::ffff:10.0.0.1]", 80));
        assert!(!rules.permits("::ffff:a00:1", 80));
        assert!(rules.permits_addr(&"[::ffff:10.0.0.2]:80".parse().unwrap()));

        let rules = list(&["!::ffff:192.168.0.5:*", "10.0.0.0/8:*", "*.internal:*"]);
        assert!(!rules.permits("192.168.0.5", 1));
        assert!(rules.permits_addr(&"[::ffff:10.9.8.7]:22".parse().unwrap()));
        assert!(!rules.permits_addr(&"[::ffff:11.0.0.1]:22".parse().unwrap()));
    }

    #[test]
    fn test_mapped_cidr_and_trailing_dot() {
        let rules = list(&["[::ffff:10.0.0.0/104]:*"]);
        assert!(rules.permits("10.1.2.3", 80));
        assert!(!rules.permits("11.1.2.3", 80));

        let rules = list(&["*", "!metadata.internal:*"]);
        assert!(!rules.permits("metadata.internal.", 80));
        assert!(!rules.permits("METADATA.internal", 80));
    }

    #[test]
    fn test_parse_errors() {
        assert!(AuthorityRule::parse("example.com").is_err());
        assert!(AuthorityRule::parse("example.com:http").is_err());
        assert!(AuthorityRule::parse("10.0.0.0/33:*").is_err());
        assert!(AuthorityRule::parse(":80").is_err());
    }

    #[test]
    fn test_display_parses_back() {
        for pattern in ["*:*", "example.com:443", "!a.b:*", "10.0.0.0/8:*", "[fd00::/8]:443", "[::1]:80"] {
            let rule = AuthorityRule::parse(pattern).unwrap();
            assert_eq!(AuthorityRule::parse(&rule.to_string()).unwrap(), rule);
        }
    }
}
