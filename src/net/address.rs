//! Listen address planning.
//!
//! # Responsibilities
//! - Split the comma-separated `LISTEN_ADDRESS` value into [`ListenSpec`]s
//! - Reject `unix://` and `fd://` specifiers (recognized, not supported)
//! - Complete an IPv6 wildcard with its IPv4 companion on the same port
//!
//! # Design Decisions
//! - Malformed specifiers are fatal; unsupported schemes are logged and skipped
//! - Bracketed hosts are IPv6 literals; bare IPv6 literals are rejected
//! - IPv4 reachability for `[::]` comes from an explicit `0.0.0.0` spec,
//!   never from dual-stack sockets

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;

/// Schemes that are recognized in a listen address but cannot be served.
const UNSUPPORTED_SCHEMES: [&str; 2] = ["unix://", "fd://"];

/// Errors produced while planning listen addresses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The specifier has no `:port` suffix.
    #[error("listen address `{0}` is missing a port")]
    MissingPort(String),

    /// The port is not a number in `0..=65535`.
    #[error("listen address `{0}` has an invalid port")]
    InvalidPort(String),

    /// The host part is not a usable address.
    #[error("listen address `{address}` has an invalid host: {reason}")]
    InvalidHost { address: String, reason: String },

    /// The specifier uses a scheme this runtime does not serve.
    #[error("unsupported scheme in listen address `{0}`")]
    UnsupportedScheme(String),
}

/// Host part of a listen specifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    /// An IPv4 literal (or the empty host, meaning `0.0.0.0`).
    Ipv4(Ipv4Addr),
    /// A bracketed IPv6 literal.
    Ipv6(Ipv6Addr),
    /// A host name, resolved to an IPv4 address at bind time.
    Name(String),
}

/// One `host:port` bind target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenSpec {
    host: Host,
    port: u16,
}

impl ListenSpec {
    /// Build a spec from its parts.
    pub fn new(host: Host, port: u16) -> Self {
        Self { host, port }
    }

    /// The IPv4 wildcard `0.0.0.0:port`.
    pub fn ipv4_wildcard(port: u16) -> Self {
        Self::new(Host::Ipv4(Ipv4Addr::UNSPECIFIED), port)
    }

    /// Parse a single `host:port` or `[ipv6]:port` token.
    pub fn parse(token: &str) -> Result<Self, AddressError> {
        let token = token.trim();
        if UNSUPPORTED_SCHEMES.iter().any(|scheme| token.starts_with(scheme)) {
            return Err(AddressError::UnsupportedScheme(token.to_string()));
        }

        let (host, port) = token
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(token.to_string()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| AddressError::InvalidPort(token.to_string()))?;

        let invalid = |reason: &str| AddressError::InvalidHost {
            address: token.to_string(),
            reason: reason.to_string(),
        };

        let host = if let Some(inner) = host.strip_prefix('[') {
            let inner = inner
                .strip_suffix(']')
                .ok_or_else(|| invalid("unterminated bracket"))?;
            let ip: Ipv6Addr = inner.parse().map_err(|_| invalid("not an IPv6 literal"))?;
            Host::Ipv6(ip)
        } else if host.is_empty() {
            Host::Ipv4(Ipv4Addr::UNSPECIFIED)
        } else if let Ok(ip) = host.parse::<Ipv4Addr>() {
            Host::Ipv4(ip)
        } else if host.parse::<Ipv6Addr>().is_ok() {
            return Err(invalid("IPv6 literals must be bracketed"));
        } else if host.contains(['/', '[', ']', ' ']) {
            return Err(invalid("not a host name"));
        } else {
            Host::Name(host.to_string())
        };

        Ok(Self { host, port })
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// True for `[::]:port`.
    pub fn is_ipv6_wildcard(&self) -> bool {
        matches!(self.host, Host::Ipv6(ip) if ip.is_unspecified())
    }

    /// True for `0.0.0.0:port`.
    pub fn is_ipv4_wildcard(&self) -> bool {
        matches!(self.host, Host::Ipv4(ip) if ip.is_unspecified())
    }
}

impl fmt::Display for ListenSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Host::Ipv4(ip) => write!(f, "{}:{}", ip, self.port),
            Host::Ipv6(ip) => write!(f, "[{}]:{}", ip, self.port),
            Host::Name(name) => write!(f, "{}:{}", name, self.port),
        }
    }
}

/// Turn a raw `LISTEN_ADDRESS` value into an ordered list of bind targets.
///
/// Empty tokens are ignored. `unix://` and `fd://` tokens are logged and
/// skipped. Any other malformed token aborts planning.
pub fn plan(raw: &str) -> Result<Vec<ListenSpec>, AddressError> {
    let mut specs = Vec::new();

    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match ListenSpec::parse(token) {
            Ok(spec) => specs.push(spec),
            Err(AddressError::UnsupportedScheme(address)) => {
                tracing::error!(address = %address, "unsupported listen address scheme, skipping");
            }
            Err(e) => return Err(e),
        }
    }

    complete_ipv4_wildcards(&mut specs);
    Ok(specs)
}

/// Append `0.0.0.0:P` for every port P that has `[::]:P` but no IPv4 wildcard.
fn complete_ipv4_wildcards(specs: &mut Vec<ListenSpec>) {
    let mut missing: Vec<u16> = Vec::new();
    for spec in specs.iter().filter(|s| s.is_ipv6_wildcard()) {
        let port = spec.port();
        let covered = specs.iter().any(|s| s.is_ipv4_wildcard() && s.port() == port);
        if !covered && !missing.contains(&port) {
            missing.push(port);
        }
    }

    for port in missing {
        tracing::debug!(port, "adding IPv4 wildcard companion for IPv6 wildcard");
        specs.push(ListenSpec::ipv4_wildcard(port));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(specs: &[ListenSpec]) -> Vec<String> {
        specs.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn parses_ipv4_and_bracketed_ipv6() {
        let v4 = ListenSpec::parse("127.0.0.1:8080").unwrap();
        assert_eq!(v4.host(), &Host::Ipv4(Ipv4Addr::LOCALHOST));
        assert_eq!(v4.port(), 8080);

        let v6 = ListenSpec::parse("[::1]:9000").unwrap();
        assert_eq!(v6.host(), &Host::Ipv6(Ipv6Addr::LOCALHOST));
        assert_eq!(v6.to_string(), "[::1]:9000");
    }

    #[test]
    fn host_names_are_kept_for_bind_time_resolution() {
        let spec = ListenSpec::parse("localhost:3000").unwrap();
        assert_eq!(spec.host(), &Host::Name("localhost".into()));
    }

    #[test]
    fn malformed_specifiers_are_fatal() {
        assert!(matches!(plan("localhost"), Err(AddressError::MissingPort(_))));
        assert!(matches!(plan("0.0.0.0:http"), Err(AddressError::InvalidPort(_))));
        assert!(matches!(plan("0.0.0.0:70000"), Err(AddressError::InvalidPort(_))));
        assert!(matches!(plan("[::1:8080"), Err(AddressError::InvalidHost { .. })));
        assert!(matches!(plan("::1:8080"), Err(AddressError::InvalidHost { .. })));
    }

    #[test]
    fn unsupported_schemes_are_skipped() {
        let specs = plan("unix:///tmp/func.sock,fd://3,127.0.0.1:8080").unwrap();
        assert_eq!(rendered(&specs), vec!["127.0.0.1:8080"]);
    }

    #[test]
    fn ipv6_wildcard_gets_ipv4_companion() {
        let specs = plan("[::]:8080").unwrap();
        assert_eq!(rendered(&specs), vec!["[::]:8080", "0.0.0.0:8080"]);
    }

    #[test]
    fn companion_is_per_port() {
        let specs = plan("[::]:8080,0.0.0.0:8080,[::]:9090").unwrap();
        assert_eq!(
            rendered(&specs),
            vec!["[::]:8080", "0.0.0.0:8080", "[::]:9090", "0.0.0.0:9090"]
        );
    }

    #[test]
    fn nothing_added_when_both_wildcards_present() {
        let specs = plan("[::]:8080,0.0.0.0:8080").unwrap();
        assert_eq!(specs.len(), 2);
    }

    #[test]
    fn nothing_added_for_specific_ipv6_addresses() {
        let specs = plan("[::1]:8080, 127.0.0.1:8081,").unwrap();
        assert_eq!(rendered(&specs), vec!["[::1]:8080", "127.0.0.1:8081"]);
    }
}
