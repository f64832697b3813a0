//! The transport contract the kernel drives.
//!
//! A [`Session`] is whatever carries JSON lines to and from the panel — a
//! TCP socket, a TLS stream, a mock in tests. The kernel never reaches into
//! the transport directly; it only ever calls through this trait, and the
//! transport only ever calls back into the kernel through the
//! `on_message`/`on_disconnected` hooks the host wires up when it builds a
//! [`crate::kernel::KernelHandle`].

use crate::error::Error;

/// Relative priority of an outbound send. Keepalive probes use [`Priority::High`]
/// so they are not starved behind a backlog of bulk paging requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Normal,
    High,
}

/// Invoked once the transport has flushed an envelope onto the wire.
/// The argument is a monotonic timestamp in fractional seconds.
pub type SentCallback = Box<dyn FnOnce(f64) + Send>;

/// Invoked if the transport fails to flush an envelope it already accepted.
pub type FailCallback = Box<dyn FnOnce(Error) + Send>;

/// A persistent, ordered, line-oriented connection to the panel.
///
/// Implementations own the actual socket and any read loop; they report
/// inbound frames and disconnects to whatever owns the `KernelHandle`
/// rather than calling back into the kernel directly, so the kernel never
/// needs a reference to its own handle.
pub trait Session: Send {
    /// Hand one JSON value to the transport for delivery. `on_sent` and
    /// `on_fail` are mutually exclusive and fire at most once each.
    fn send_json(&mut self, value: serde_json::Value, priority: Priority, on_sent: SentCallback, on_fail: FailCallback);

    /// Tear down the transport. Idempotent.
    fn close(&mut self);
}
