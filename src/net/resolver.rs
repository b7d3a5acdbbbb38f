//! Endpoint resolution and target parsing
//!
//! [`resolve`] turns a host and port into the ordered candidate list the
//! connector walks. [`parse_target`] splits the textual forms people type on
//! command lines:
//! - "localhost" - "localhost:80" - "localhost 80"
//! - "127.0.0.1" - "127.0.0.1:80" - "127.0.0.1 80"
//! - "[::1]"     - "[::1]:80"     - "[::1] 80"
//! - "::1"       (host only)

use std::net::{SocketAddr, ToSocketAddrs};

use super::{Endpoint, Error, Result};

/// Host and optional port parsed from a target string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: Option<u32>,
}

/// Resolve `host` and `port` to an ordered list of candidate endpoints.
///
/// `None` asks for wildcard endpoints suitable for binding, IPv4 first.
/// Otherwise the system resolver's ordering is kept as-is.
pub fn resolve(host: Option<&str>, port: u32) -> Result<Vec<Endpoint>> {
    let port = check_port(port)?;

    let host = match host {
        None => return Ok(vec![Endpoint::any_v4(port), Endpoint::any_v6(port)]),
        Some(h) => h.trim(),
    };

    if host.is_empty() {
        return Err(Error::InvalidAddress("Empty host".to_string()));
    }

    // Bracketed IPv6 literals are accepted for symmetry with parse_target
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| Error::ResolutionFailed(format!("{}: {}", host, e)))?
        .collect();

    if addrs.is_empty() {
        return Err(Error::ResolutionFailed(format!(
            "No addresses found for {}:{}",
            host, port
        )));
    }

    tracing::debug!(host, port, candidates = addrs.len(), "resolved host");
    Ok(addrs.into_iter().map(Endpoint::new).collect())
}

/// Validate a wire-level port number
pub(crate) fn check_port(port: u32) -> Result<u16> {
    u16::try_from(port).map_err(|_| Error::InvalidPort(format!("{} is out of range", port)))
}

/// Split a target string into host and port.
///
/// # Examples
/// ```
/// use remote_socket::net::parse_target;
///
/// let target = parse_target("localhost:8889").unwrap();
/// assert_eq!(target.host, "localhost");
/// assert_eq!(target.port, Some(8889));
/// ```
pub fn parse_target(addr: &str) -> Result<Target> {
    let (host, port) = split_address(addr)?;
    let port = match port {
        Some(p) => Some(parse_port(p)?),
        None => None,
    };
    Ok(Target {
        host: host.to_string(),
        port,
    })
}

fn split_address(addr: &str) -> Result<(&str, Option<&str>)> {
    let addr = addr.trim();

    if addr.is_empty() {
        return Err(Error::InvalidAddress("Empty address".to_string()));
    }

    // [::1]:80 or [::1] 80
    if let Some(rest) = addr.strip_prefix('[') {
        let close = rest
            .find(']')
            .ok_or_else(|| Error::InvalidAddress("IPv6 address lacks ']'".to_string()))?;

        let host = &rest[..close];
        let tail = &rest[close + 1..];
        if host.is_empty() {
            return Err(Error::InvalidAddress("Empty IPv6 address".to_string()));
        }

        let port = match tail.chars().next() {
            None => None,
            Some(' ') | Some(':') => Some(tail[1..].trim()).filter(|p| !p.is_empty()),
            Some(_) => {
                return Err(Error::InvalidAddress(
                    "IPv6 address has wrong port separator".to_string(),
                ))
            }
        };
        return Ok((host, port));
    }

    let (host, port) = if let Some(space) = addr.find(' ') {
        (&addr[..space], addr[space + 1..].trim())
    } else if let Some(colon) = addr.find(':') {
        // More than one colon: bare IPv6 literal, no port
        if addr[colon + 1..].contains(':') {
            return Ok((addr, None));
        }
        (&addr[..colon], &addr[colon + 1..])
    } else {
        (addr, "")
    };

    if host.is_empty() {
        return Err(Error::InvalidAddress(format!("Missing host in '{}'", addr)));
    }

    Ok((host, Some(port).filter(|p| !p.is_empty())))
}

fn parse_port(port: &str) -> Result<u32> {
    let value: u32 = port
        .parse()
        .map_err(|_| Error::InvalidPort(format!("'{}' is not a number", port)))?;
    check_port(value)?;
    Ok(value)
}
