//! Network transport layer
//!
//! Blocking TCP plumbing for a one-peer-at-a-time remote protocol: endpoint
//! resolution, timeout-bounded connect, a listen/accept pair for the server
//! role and exact-size send/receive. Framing and reconnection policy belong to
//! the layers above.

pub mod alloc;
pub mod config;
pub mod endpoint;
pub mod facade;
pub mod handle;
pub mod lifecycle;
pub mod resolver;
pub mod server;
pub mod tcp;

pub use alloc::{CountingAllocator, HandleAllocator, SystemAllocator};
pub use config::{TimeoutScope, TransportConfig, DEFAULT_CONNECT_TIMEOUT};
pub use endpoint::{Endpoint, Family};
pub use handle::{Handle, HandleKind};
pub use lifecycle::{is_started, shutdown, startup};
pub use resolver::{parse_target, resolve, Target};
pub use server::{ConnectionWaiter, WaiterConfig};
pub use tcp::Transport;

/// Result type for network operations
pub type Result<T> = std::result::Result<T, Error>;

/// Network operation errors
///
/// The public boolean/`Option` entry points collapse these; the `try_*`
/// variants on [`Transport`] surface them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid address format: {0}")]
    InvalidAddress(String),

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Address resolution failed: {0}")]
    ResolutionFailed(String),

    #[error("Socket creation failed: {0}")]
    SocketCreate(#[source] std::io::Error),

    #[error("Connection to {0} timed out")]
    ConnectTimeout(std::net::SocketAddr),

    #[error("Connection to {addr} failed: {source}")]
    Connect {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Bind to {addr} failed: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Listen failed: {0}")]
    Listen(#[source] std::io::Error),

    #[error("Accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("Short transfer: expected {expected} bytes, got {actual}")]
    ShortTransfer { expected: usize, actual: usize },

    #[error("Peer disconnected")]
    Disconnected,

    #[error("Handle allocator refused a new handle")]
    AllocationRefused,

    #[error("No listen socket")]
    NoListener,
}
