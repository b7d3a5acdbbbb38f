//! Blocking TCP transport for a remote protocol
//!
//! The [`net`] module provides a handle-based connection layer: a client
//! connects with a bounded timeout, a server listens and accepts one peer at
//! a time, and both sides move exact-size byte blocks. Framing and
//! reconnection are left to the protocol built on top.
//!
//! ```no_run
//! use remote_socket::net::{self, Transport, TransportConfig};
//!
//! net::startup();
//! let transport = Transport::new(TransportConfig::new());
//! if let Some(handle) = transport.connect("localhost", 8889) {
//!     let header = [0u8; 16];
//!     if !transport.send(&handle, &header) {
//!         // the link is broken; release it
//!     }
//!     transport.disconnect(handle);
//! }
//! net::shutdown();
//! ```

pub mod net;
