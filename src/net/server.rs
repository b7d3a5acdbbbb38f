//! Server-side connection waiting
//!
//! The transport accepts one peer per call and never loops on its own. A
//! server application usually wants a thread that keeps a listen socket open,
//! reopens it when the port was busy, and hands each peer over as it arrives.
//! [`ConnectionWaiter`] is that thread.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{Handle, HandleAllocator, Transport};

/// Settings for a [`ConnectionWaiter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaiterConfig {
    port: u32,
    retry_delay: Duration,
}

impl WaiterConfig {
    /// Wait on `port`; 0 lets the system pick one
    pub fn new(port: u32) -> Self {
        WaiterConfig {
            port,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Pause between attempts to open the listen socket (default: 1s)
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn port(&self) -> u32 {
        self.port
    }
}

#[derive(Debug, Default)]
struct WaiterState {
    waiting: AtomicBool,
    stop: AtomicBool,
    local_port: AtomicU16,
}

/// Background thread accepting peers one at a time.
#[derive(Debug)]
pub struct ConnectionWaiter {
    state: Arc<WaiterState>,
    thread: Option<JoinHandle<()>>,
}

impl ConnectionWaiter {
    /// Start waiting for peers; every accepted handle goes to `on_connect`.
    pub fn spawn<A, F>(
        transport: Arc<Transport<A>>,
        config: WaiterConfig,
        on_connect: F,
    ) -> io::Result<Self>
    where
        A: HandleAllocator + 'static,
        F: FnMut(Handle) + Send + 'static,
    {
        let state = Arc::new(WaiterState::default());
        let thread_state = Arc::clone(&state);

        let thread = thread::Builder::new()
            .name(format!("connection-waiter-{}", config.port))
            .spawn(move || run(&transport, &config, &thread_state, on_connect))?;

        Ok(ConnectionWaiter {
            state,
            thread: Some(thread),
        })
    }

    /// True while a listen socket is open and waiting for a peer
    pub fn is_waiting_for_connection(&self) -> bool {
        self.state.waiting.load(Ordering::SeqCst)
    }

    /// Port of the open listen socket, if any
    pub fn local_port(&self) -> Option<u16> {
        if !self.is_waiting_for_connection() {
            return None;
        }
        match self.state.local_port.load(Ordering::Acquire) {
            0 => None,
            port => Some(port),
        }
    }

    /// Stop waiting and join the thread.
    pub fn stop(&mut self) {
        self.state.stop.store(true, Ordering::SeqCst);

        if let Some(port) = self.local_port() {
            // accept() has no timeout; a throwaway loopback peer unblocks it
            let wake = std::net::TcpStream::connect(("127.0.0.1", port));
            tracing::trace!(port, ok = wake.is_ok(), "woke connection waiter");
        }

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("connection waiter thread panicked");
            }
        }
    }
}

impl Drop for ConnectionWaiter {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Marks the waiter as waiting until dropped, including by a panicking callback.
struct WaitingGuard<'a> {
    state: &'a WaiterState,
}

impl<'a> WaitingGuard<'a> {
    fn enter(state: &'a WaiterState, port: u16) -> Self {
        state.local_port.store(port, Ordering::Release);
        state.waiting.store(true, Ordering::SeqCst);
        WaitingGuard { state }
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.state.waiting.store(false, Ordering::SeqCst);
        self.state.local_port.store(0, Ordering::Release);
    }
}

fn run<A, F>(
    transport: &Transport<A>,
    config: &WaiterConfig,
    state: &WaiterState,
    mut on_connect: F,
) where
    A: HandleAllocator,
    F: FnMut(Handle),
{
    while !state.stop.load(Ordering::SeqCst) {
        let listener = match transport.try_listen(config.port) {
            Ok(listener) => listener,
            Err(e) => {
                tracing::debug!(port = config.port, error = %e, "listen unavailable, retrying");
                thread::sleep(config.retry_delay);
                continue;
            }
        };

        let port = listener.local_addr().map(|a| a.port()).unwrap_or(0);
        let waiting = WaitingGuard::enter(state, port);
        tracing::info!(port, "waiting for connection");

        // stop() sets the flag before reading `waiting`, so either this
        // check sees it or stop() sends a wake-up peer
        while !state.stop.load(Ordering::SeqCst) {
            let accepted = transport.accept(&listener);
            if state.stop.load(Ordering::SeqCst) {
                if let Ok(handle) = accepted {
                    transport.disconnect(handle);
                }
                break;
            }
            match accepted {
                Ok(handle) => on_connect(handle),
                Err(e) => {
                    tracing::warn!(port, error = %e, "accept failed, reopening listen socket");
                    break;
                }
            }
        }

        drop(waiting);
        transport.disconnect(listener);
    }
    tracing::debug!(port = config.port, "connection waiter stopped");
}
