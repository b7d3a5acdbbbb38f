//! Process-wide socket subsystem bracket
//!
//! Unix sockets need no global initialization, so [`startup`] always succeeds.
//! Calls are still counted so misuse shows up in logs.

use std::sync::atomic::{AtomicUsize, Ordering};

static STARTED: AtomicUsize = AtomicUsize::new(0);

/// Initialize networking. Call once before the first connect or listen.
pub fn startup() -> bool {
    let previous = STARTED.fetch_add(1, Ordering::AcqRel);
    tracing::debug!(depth = previous + 1, "network startup");
    true
}

/// Tear networking down after every handle has been released.
pub fn shutdown() {
    let result = STARTED.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    match result {
        Ok(previous) => tracing::debug!(depth = previous - 1, "network shutdown"),
        Err(_) => tracing::warn!("network shutdown without matching startup"),
    }
}

/// Whether at least one [`startup`] is outstanding
pub fn is_started() -> bool {
    STARTED.load(Ordering::Acquire) > 0
}
