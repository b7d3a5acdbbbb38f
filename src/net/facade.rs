//! Free-function entry points
//!
//! The same operations as [`Transport`], backed by a process-wide transport
//! with default settings and the [`SystemAllocator`]. Handy for callers that
//! want the plain `Option`/`bool` surface without carrying a transport around.

use std::sync::OnceLock;

use super::{Handle, SystemAllocator, Transport, TransportConfig};

pub use super::lifecycle::{shutdown, startup};

fn transport() -> &'static Transport<SystemAllocator> {
    static TRANSPORT: OnceLock<Transport<SystemAllocator>> = OnceLock::new();
    TRANSPORT.get_or_init(|| Transport::new(TransportConfig::default()))
}

pub fn connect(host: &str, port: u32) -> Option<Handle> {
    transport().connect(host, port)
}

pub fn listen_start(port: u32) -> Option<Handle> {
    transport().listen_start(port)
}

pub fn listen_connect(listener: Option<&Handle>) -> Option<Handle> {
    transport().listen_connect(listener)
}

pub fn disconnect(handle: Handle) {
    transport().disconnect(handle)
}

pub fn receive(handle: &Handle, buf: &mut [u8]) -> bool {
    transport().receive(handle, buf)
}

pub fn send(handle: &Handle, buf: &[u8]) -> bool {
    transport().send(handle, buf)
}
