//! Handle allocation
//!
//! The transport never builds or tears down [`Handle`] objects itself; it asks
//! an injected [`HandleAllocator`]. Embedders that track or cap socket usage
//! supply their own.

use std::sync::atomic::{AtomicUsize, Ordering};

use socket2::Socket;

use super::{Handle, HandleKind};

/// Creates and destroys handle objects on behalf of a transport.
pub trait HandleAllocator: Send + Sync {
    /// Wrap a freshly opened socket. Returning `None` refuses it; the
    /// transport then closes the socket and reports the operation as failed.
    fn create(&self, socket: Socket, kind: HandleKind) -> Option<Handle> {
        Some(Handle::from_socket(socket, kind))
    }

    /// Release a handle. The socket is shut down and closed.
    fn destroy(&self, handle: Handle) {
        handle.close();
    }
}

/// Plain allocator with no bookkeeping
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl HandleAllocator for SystemAllocator {}

/// Allocator that counts handles and optionally caps how many are live.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    created: AtomicUsize,
    destroyed: AtomicUsize,
    refused: AtomicUsize,
    live: AtomicUsize,
    limit: Option<usize>,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse new handles while `limit` are live
    pub fn with_limit(limit: usize) -> Self {
        CountingAllocator {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn refused(&self) -> usize {
        self.refused.load(Ordering::Acquire)
    }

    /// Handles created and not yet destroyed
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

impl HandleAllocator for CountingAllocator {
    fn create(&self, socket: Socket, kind: HandleKind) -> Option<Handle> {
        let limit = self.limit.unwrap_or(usize::MAX);
        // Reserve the slot in one step so concurrent creators cannot overshoot
        let reserved = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < limit).then_some(n + 1));

        if reserved.is_err() {
            self.refused.fetch_add(1, Ordering::AcqRel);
            tracing::debug!(limit, ?kind, "handle limit reached");
            return None;
        }
        self.created.fetch_add(1, Ordering::AcqRel);
        Some(Handle::from_socket(socket, kind))
    }

    fn destroy(&self, handle: Handle) {
        self.destroyed.fetch_add(1, Ordering::AcqRel);
        self.live.fetch_sub(1, Ordering::AcqRel);
        handle.close();
    }
}
