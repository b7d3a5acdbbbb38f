//! Resolved network endpoints
//!
//! An [`Endpoint`] is the neutral form of what the resolver hands to the
//! connector: address family, socket type and address. Everything that talks
//! to the native socket API takes one of these.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol, Type};

/// Address family of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Ipv4,
    Ipv6,
}

impl Family {
    pub(crate) fn domain(self) -> Domain {
        match self {
            Family::Ipv4 => Domain::IPV4,
            Family::Ipv6 => Domain::IPV6,
        }
    }

    /// Get address family as a string
    pub fn as_str(self) -> &'static str {
        match self {
            Family::Ipv4 => "IPv4",
            Family::Ipv6 => "IPv6",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved (family, stream type, address, port) tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    addr: SocketAddr,
}

impl Endpoint {
    /// Create an endpoint from a standard library SocketAddr
    pub fn new(addr: SocketAddr) -> Self {
        Endpoint { addr }
    }

    /// Wildcard IPv4 endpoint (0.0.0.0:port)
    pub fn any_v4(port: u16) -> Self {
        Endpoint::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
    }

    /// Wildcard IPv6 endpoint ([::]:port)
    pub fn any_v6(port: u16) -> Self {
        Endpoint::new(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port))
    }

    pub fn family(&self) -> Family {
        match self.addr {
            SocketAddr::V4(_) => Family::Ipv4,
            SocketAddr::V6(_) => Family::Ipv6,
        }
    }

    /// Socket type used for this endpoint; the transport is stream only.
    pub fn socket_type(&self) -> Type {
        Type::STREAM
    }

    pub fn protocol(&self) -> Protocol {
        Protocol::TCP
    }

    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// True for 0.0.0.0 and ::
    pub fn is_wildcard(&self) -> bool {
        self.addr.ip().is_unspecified()
    }

    /// Format address as string (without port)
    ///
    /// IPv4-mapped IPv6 addresses (::ffff:a.b.c.d) print as plain IPv4.
    pub fn addr_string(&self) -> String {
        match self.addr.ip() {
            IpAddr::V4(ip) => ip.to_string(),
            IpAddr::V6(ip) => match ip.to_ipv4_mapped() {
                Some(v4) => v4.to_string(),
                None => ip.to_string(),
            },
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint::new(addr)
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.addr
    }
}

impl From<Endpoint> for socket2::SockAddr {
    fn from(endpoint: Endpoint) -> Self {
        socket2::SockAddr::from(endpoint.addr)
    }
}
