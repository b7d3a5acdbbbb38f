//! TCP transport operations
//!
//! [`Transport`] implements the whole handle lifecycle: timeout-bounded
//! connect, listen/accept for the server role, exact-size send/receive and
//! release. Each operation exists twice: a `try_*` form returning
//! [`Result`], and the plain form that logs the error and collapses it to
//! `None` or `false` for callers that only care whether the link is usable.

use std::io;
use std::mem::MaybeUninit;
use std::net::SocketAddr;
use std::os::fd::AsRawFd;
use std::time::{Duration, Instant};

use socket2::Socket;

use super::resolver::resolve;
use super::{
    Endpoint, Error, Family, Handle, HandleAllocator, HandleKind, Result, SystemAllocator,
    TimeoutScope, TransportConfig,
};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: libc::c_int = 0;

const RECV_FLAGS: libc::c_int = libc::MSG_WAITALL;

/// Listen backlog: one pending peer at a time
const LISTEN_BACKLOG: libc::c_int = 0;

/// Blocking TCP transport parameterized by its handle allocator.
#[derive(Debug)]
pub struct Transport<A: HandleAllocator = SystemAllocator> {
    config: TransportConfig,
    allocator: A,
}

impl Default for Transport<SystemAllocator> {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl Transport<SystemAllocator> {
    pub fn new(config: TransportConfig) -> Self {
        Transport {
            config,
            allocator: SystemAllocator,
        }
    }
}

impl<A: HandleAllocator> Transport<A> {
    pub fn with_allocator(config: TransportConfig, allocator: A) -> Self {
        Transport { config, allocator }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Connect to `host:port`, or `None` when no candidate endpoint answered.
    pub fn connect(&self, host: &str, port: u32) -> Option<Handle> {
        self.try_connect(host, port)
            .map_err(|e| tracing::warn!(host, port, error = %e, "connect failed"))
            .ok()
    }

    /// Resolve `host` and try each candidate in order.
    ///
    /// Fails with the error of the first candidate when none succeeds.
    pub fn try_connect(&self, host: &str, port: u32) -> Result<Handle> {
        let endpoints = resolve(Some(host), port)?;
        self.connect_endpoints(&endpoints)
    }

    /// Try already resolved endpoints in order.
    pub fn connect_endpoints(&self, endpoints: &[Endpoint]) -> Result<Handle> {
        self.connect_candidates(endpoints, connect_endpoint)
    }

    fn connect_candidates<C>(&self, endpoints: &[Endpoint], mut connect_one: C) -> Result<Handle>
    where
        C: FnMut(&Endpoint, Duration) -> Result<Socket>,
    {
        let timeout = self.config.get_connect_timeout();
        let deadline = Instant::now() + timeout;
        let mut first_err = None;

        for endpoint in endpoints {
            let budget = match self.config.get_timeout_scope() {
                TimeoutScope::PerCandidate => Ok(timeout),
                TimeoutScope::PerCall => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        Err(Error::ConnectTimeout(endpoint.addr()))
                    } else {
                        Ok(left)
                    }
                }
            };

            let attempt = budget.and_then(|budget| {
                tracing::debug!(%endpoint, ?budget, "connecting");
                connect_one(endpoint, budget)
            });

            // A socket whose options cannot be set counts as a failed candidate
            let attempt = attempt.and_then(|socket| {
                self.prepare_stream(&socket)?;
                Ok(socket)
            });

            match attempt {
                Ok(socket) => {
                    tracing::debug!(%endpoint, fd = socket.as_raw_fd(), "connected");
                    return self.wrap(socket, HandleKind::Connected);
                }
                Err(e) => {
                    tracing::debug!(%endpoint, error = %e, "candidate failed");
                    first_err.get_or_insert(e);
                }
            }
        }

        Err(first_err
            .unwrap_or_else(|| Error::ResolutionFailed("No candidate endpoints".to_string())))
    }

    /// Open a listen socket on `port`, or `None` on failure.
    pub fn listen_start(&self, port: u32) -> Option<Handle> {
        self.try_listen(port)
            .map_err(|e| tracing::warn!(port, error = %e, "listen failed"))
            .ok()
    }

    /// Bind the first wildcard endpoint for `port` and listen on it.
    pub fn try_listen(&self, port: u32) -> Result<Handle> {
        let endpoint = resolve(None, port)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ResolutionFailed("No wildcard endpoint".to_string()))?;

        let socket = Socket::new(
            endpoint.family().domain(),
            endpoint.socket_type(),
            Some(endpoint.protocol()),
        )
        .map_err(Error::SocketCreate)?;

        if self.config.get_listen_reuse() {
            socket.set_reuse_address(true)?;
            #[cfg(not(any(target_os = "solaris", target_os = "illumos")))]
            socket.set_reuse_port(true)?;
        }

        if endpoint.family() == Family::Ipv6 {
            socket.set_only_v6(true)?;
        }

        socket
            .bind(&endpoint.into())
            .map_err(|source| Error::Bind {
                addr: endpoint.addr(),
                source,
            })?;
        socket.listen(LISTEN_BACKLOG).map_err(Error::Listen)?;

        tracing::debug!(%endpoint, reuse = self.config.get_listen_reuse(), "listening");
        self.wrap(socket, HandleKind::Listening)
    }

    /// Wait for one peer on `listener`.
    ///
    /// Returns `None` straight away when there is no listener.
    pub fn listen_connect(&self, listener: Option<&Handle>) -> Option<Handle> {
        let listener = listener?;
        self.accept(listener)
            .map_err(|e| tracing::warn!(error = %e, "accept failed"))
            .ok()
    }

    /// Block until one peer connects to `listener`.
    pub fn accept(&self, listener: &Handle) -> Result<Handle> {
        if !listener.is_listener() {
            return Err(Error::NoListener);
        }

        let (socket, peer) = listener.socket().accept().map_err(Error::Accept)?;
        socket.set_nonblocking(false)?;
        self.prepare_stream(&socket)?;

        tracing::debug!(peer = ?peer.as_socket(), fd = socket.as_raw_fd(), "accepted");
        self.wrap(socket, HandleKind::Accepted)
    }

    /// Shut down and release a handle. The handle is consumed.
    ///
    /// A released handle cannot be used again:
    ///
    /// ```compile_fail
    /// use remote_socket::net::{Transport, TransportConfig};
    ///
    /// let transport = Transport::new(TransportConfig::new());
    /// let handle = transport.connect("127.0.0.1", 8889).unwrap();
    /// transport.disconnect(handle);
    /// transport.send(&handle, b"late");
    /// ```
    pub fn disconnect(&self, handle: Handle) {
        tracing::debug!(?handle, "disconnect");
        self.allocator.destroy(handle);
    }

    /// Receive exactly `buf.len()` bytes.
    pub fn receive(&self, handle: &Handle, buf: &mut [u8]) -> bool {
        self.try_receive(handle, buf)
            .map_err(|e| tracing::warn!(?handle, size = buf.len(), error = %e, "receive failed"))
            .is_ok()
    }

    /// Receive exactly `buf.len()` bytes in one waiting call.
    ///
    /// An empty buffer succeeds without touching the socket; `MSG_WAITALL`
    /// would otherwise wait for at least one byte.
    pub fn try_receive(&self, handle: &Handle, buf: &mut [u8]) -> Result<()> {
        let expected = buf.len();
        if expected == 0 {
            return Ok(());
        }
        // SAFETY: `u8` and `MaybeUninit<u8>` share a layout, and recv only
        // writes initialized bytes into the slice.
        let uninit = unsafe { &mut *(buf as *mut [u8] as *mut [MaybeUninit<u8>]) };

        let actual = handle
            .socket()
            .recv_with_flags(uninit, RECV_FLAGS)
            .map_err(transfer_error)?;

        tracing::trace!(fd = handle.as_raw_fd(), expected, actual, "received");
        check_transfer(expected, actual)
    }

    /// Send exactly `buf.len()` bytes.
    pub fn send(&self, handle: &Handle, buf: &[u8]) -> bool {
        self.try_send(handle, buf)
            .map_err(|e| tracing::warn!(?handle, size = buf.len(), error = %e, "send failed"))
            .is_ok()
    }

    /// Send all of `buf` in one call; a short send is a failure.
    pub fn try_send(&self, handle: &Handle, buf: &[u8]) -> Result<()> {
        let expected = buf.len();
        if expected == 0 {
            return Ok(());
        }
        let actual = handle
            .socket()
            .send_with_flags(buf, SEND_FLAGS)
            .map_err(transfer_error)?;

        tracing::trace!(fd = handle.as_raw_fd(), expected, actual, "sent");
        check_transfer(expected, actual)
    }

    fn prepare_stream(&self, socket: &Socket) -> Result<()> {
        if self.config.get_nodelay() {
            socket.set_nodelay(true)?;
        }
        #[cfg(target_vendor = "apple")]
        socket.set_nosigpipe(true)?;
        Ok(())
    }

    fn wrap(&self, socket: Socket, kind: HandleKind) -> Result<Handle> {
        self.allocator
            .create(socket, kind)
            .ok_or(Error::AllocationRefused)
    }
}

/// Non-blocking connect to one endpoint, restored to blocking on success.
///
/// The socket is dropped (closed) on every error path.
fn connect_endpoint(endpoint: &Endpoint, timeout: Duration) -> Result<Socket> {
    let addr = endpoint.addr();
    let socket = Socket::new(
        endpoint.family().domain(),
        endpoint.socket_type(),
        Some(endpoint.protocol()),
    )
    .map_err(Error::SocketCreate)?;

    socket.set_nonblocking(true)?;

    match socket.connect(&(*endpoint).into()) {
        Ok(()) => {}
        Err(e)
            if e.raw_os_error() == Some(libc::EINPROGRESS)
                || e.kind() == io::ErrorKind::WouldBlock =>
        {
            wait_for_connect(&socket, addr, timeout)?;
        }
        Err(source) => return Err(Error::Connect { addr, source }),
    }

    socket.set_nonblocking(false)?;
    Ok(socket)
}

/// Wait for a non-blocking connect to complete
fn wait_for_connect(socket: &Socket, addr: SocketAddr, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let mut pfd = libc::pollfd {
        fd: socket.as_raw_fd(),
        events: libc::POLLOUT,
        revents: 0,
    };

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let ret = unsafe { libc::poll(&mut pfd, 1, poll_millis(remaining)) };

        if ret > 0 {
            break;
        }
        if ret == 0 {
            return Err(Error::ConnectTimeout(addr));
        }

        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(Error::Connect { addr, source: err });
        }
    }

    match socket.take_error() {
        Ok(None) => Ok(()),
        Ok(Some(source)) | Err(source) => Err(Error::Connect { addr, source }),
    }
}

/// Milliseconds for poll(2), rounded up so the full timeout elapses
fn poll_millis(timeout: Duration) -> libc::c_int {
    let ms = timeout.as_nanos().div_ceil(1_000_000);
    ms.min(libc::c_int::MAX as u128) as libc::c_int
}

fn check_transfer(expected: usize, actual: usize) -> Result<()> {
    if actual == expected {
        Ok(())
    } else if actual == 0 {
        Err(Error::Disconnected)
    } else {
        Err(Error::ShortTransfer { expected, actual })
    }
}

fn transfer_error(err: io::Error) -> Error {
    if is_disconnect(&err) {
        Error::Disconnected
    } else {
        Error::Io(err)
    }
}

/// Check if an I/O error means the peer is gone
pub fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
    ) || matches!(
        err.raw_os_error(),
        Some(libc::ECONNRESET)
            | Some(libc::ENOTCONN)
            | Some(libc::EPIPE)
            | Some(libc::ENETRESET)
            | Some(libc::ECONNABORTED)
    )
}
