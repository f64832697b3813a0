//! Error taxonomy for the kernel and facade.
//!
//! Per-request errors surface through [`crate::client::ExecResult::error`];
//! connection-level errors abort every pending request with
//! [`Error::ConnectionLost`]. Root error envelopes never become
//! [`Error::ApiError`] or [`Error::DispatchRoutingError`] — those are only
//! ever raised for envelopes that already matched a pending waiter.

use std::fmt;

/// A `(domain, verb)` route pair, e.g. `("zone", "get_configured")`.
pub type Route = (String, String);

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A pending request's deadline elapsed before a matching reply arrived.
    #[error("timed out waiting for reply to {0}")]
    E27Timeout(String),

    /// The session was lost while one or more requests were outstanding.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The transport failed to flush an outbound envelope.
    #[error("session I/O error: {0}")]
    SessionIoError(String),

    /// An operation was attempted after [`crate::kernel::Kernel::close`].
    #[error("session is closed")]
    SessionClosed,

    /// A reply's `seq` matched a pending waiter but its `(domain, verb)`
    /// did not match what was requested.
    #[error("reply seq matched but route differed: expected {expected:?}, observed {observed:?}")]
    DispatchRoutingError { expected: Route, observed: Route },

    /// A non-authorization protocol error reported by the panel.
    #[error("panel error {code}: {message}")]
    ApiError { code: i64, message: String },

    /// A command key has no registered route builder.
    #[error("no route registered for command {0:?}")]
    RouteNotRegistered(String),

    /// Two requests were registered under the same sequence number.
    #[error("duplicate pending seq {0}")]
    DuplicateSeq(i32),

    /// The caller-supplied arguments could not be turned into a payload.
    #[error("invalid arguments for {command_key}: {reason}")]
    InvalidArgs { command_key: String, reason: String },
}

impl Error {
    /// A short, stable name for the error variant — used in logs/events.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::E27Timeout(_) => "E27Timeout",
            Error::ConnectionLost(_) => "ConnectionLost",
            Error::SessionIoError(_) => "SessionIOError",
            Error::SessionClosed => "SessionClosed",
            Error::DispatchRoutingError { .. } => "DispatchRoutingError",
            Error::ApiError { .. } => "ApiError",
            Error::RouteNotRegistered(_) => "RouteNotRegistered",
            Error::DuplicateSeq(_) => "DuplicateSeq",
            Error::InvalidArgs { .. } => "InvalidArgs",
        }
    }
}

/// Errors raised while loading a [`crate::config::KernelConfig`] from TOML.
#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    MissingField(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {s}"),
            ConfigError::Parse(s) => write!(f, "parse error: {s}"),
            ConfigError::MissingField(s) => write!(f, "missing required field: {s}"),
            ConfigError::InvalidValue(s) => write!(f, "invalid config value: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}
