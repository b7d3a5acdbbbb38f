//! Transport configuration

use std::time::Duration;

/// Connect timeout used when none is configured
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// How the connect timeout is spent across resolved candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutScope {
    /// Every candidate gets the full timeout.
    #[default]
    PerCandidate,
    /// One deadline for the whole connect call.
    PerCall,
}

/// Settings shared by every operation of a [`Transport`](super::Transport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    connect_timeout: Duration,
    timeout_scope: TimeoutScope,
    listen_reuse: bool,
    nodelay: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportConfig {
    /// Create a configuration with default settings
    ///
    /// Listen reuse follows the `listen-reuse` cargo feature.
    pub fn new() -> Self {
        TransportConfig {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout_scope: TimeoutScope::PerCandidate,
            listen_reuse: cfg!(feature = "listen-reuse"),
            nodelay: true,
        }
    }

    /// Set connection timeout (millisecond resolution)
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn timeout_scope(mut self, scope: TimeoutScope) -> Self {
        self.timeout_scope = scope;
        self
    }

    /// Request SO_REUSEADDR and SO_REUSEPORT on listen sockets
    pub fn listen_reuse(mut self, reuse: bool) -> Self {
        self.listen_reuse = reuse;
        self
    }

    /// Set TCP_NODELAY on connected and accepted sockets
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    pub fn get_connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn get_timeout_scope(&self) -> TimeoutScope {
        self.timeout_scope
    }

    pub fn get_listen_reuse(&self) -> bool {
        self.listen_reuse
    }

    pub fn get_nodelay(&self) -> bool {
        self.nodelay
    }
}
