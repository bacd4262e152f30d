//! Live-capture collaborator interface.
//!
//! The engine does not talk to network interfaces itself; a capture
//! backend (libpcap bindings, AF_PACKET, a replay harness) implements
//! these traits and feeds captured bytes to [`crate::packet::Packet::parse`]
//! using the session's declared link type. Everything here is synchronous:
//! `next` blocks up to its timeout on the calling thread.

use std::time::Duration;

use crate::error::Error;

/// Capture session configuration.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Maximum bytes captured per packet.
    pub snaplen: usize,
    /// Enable promiscuous mode.
    pub promisc: bool,
    /// BPF filter program, if any.
    pub filter: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            snaplen: 65535,
            promisc: true,
            filter: None,
        }
    }
}

/// An open capture session on one interface.
pub trait CaptureSession {
    /// Block up to `timeout` for the next packet. `Ok(None)` is a timeout,
    /// not an error.
    fn next(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, Error>;

    /// Inject one frame on the session's interface.
    fn inject(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Link type of captured frames (selects the outermost header kind).
    fn link_type(&self) -> u32;

    /// Release the underlying handle. Dropping the session must do the
    /// same; this form surfaces errors.
    fn close(self: Box<Self>) -> Result<(), Error>;
}

/// A capture backend.
pub trait CaptureProvider {
    /// Open a session on the named interface.
    fn open(&self, iface: &str, config: &CaptureConfig) -> Result<Box<dyn CaptureSession>, Error>;

    /// Name of the interface captures default to, when one exists.
    fn default_iface(&self) -> Option<String>;
}
