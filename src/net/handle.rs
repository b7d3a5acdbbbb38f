//! Socket handles
//!
//! A [`Handle`] owns exactly one open socket. It cannot be cloned, and
//! releasing it through [`Transport::disconnect`](super::Transport::disconnect)
//! consumes it, so a released handle cannot be named again.

use std::fmt;
use std::net::{Shutdown, SocketAddr};
use std::os::fd::{AsRawFd, RawFd};

use socket2::Socket;

use super::{Error, Result};

/// What produced a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// Client side of an outgoing connection
    Connected,
    /// Passive socket waiting for peers
    Listening,
    /// Server side of an accepted connection
    Accepted,
}

/// Exclusive owner of one live socket descriptor.
pub struct Handle {
    socket: Socket,
    kind: HandleKind,
}

impl Handle {
    /// Wrap an open socket.
    ///
    /// Used by [`HandleAllocator`](super::HandleAllocator) implementations;
    /// the socket is moved in, so ownership stays unique.
    pub fn from_socket(socket: Socket, kind: HandleKind) -> Self {
        Handle { socket, kind }
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn is_listener(&self) -> bool {
        self.kind == HandleKind::Listening
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        sock_to_std(self.socket.local_addr()?)
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        sock_to_std(self.socket.peer_addr()?)
    }

    pub(crate) fn socket(&self) -> &Socket {
        &self.socket
    }

    /// Shut both directions down, then close the descriptor.
    pub(crate) fn close(self) {
        // Listen sockets and already reset peers report ENOTCONN here
        if let Err(e) = self.socket.shutdown(Shutdown::Both) {
            tracing::trace!(fd = self.socket.as_raw_fd(), error = %e, "shutdown before close");
        }
        drop(self.socket);
    }
}

fn sock_to_std(addr: socket2::SockAddr) -> Result<SocketAddr> {
    addr.as_socket()
        .ok_or_else(|| Error::InvalidAddress("Socket has no IP address".to_string()))
}

impl AsRawFd for Handle {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("fd", &self.socket.as_raw_fd())
            .field("kind", &self.kind)
            .finish()
    }
}
