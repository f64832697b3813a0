//! Protocol kernel for a persistent, line-oriented JSON session with a
//! security/automation panel.
//!
//! [`Client`] is the entry point: construct one with a [`Session`]
//! implementation for your transport and a [`KernelConfig`], then call
//! [`Client::bootstrap`] once connected and drive everything else through
//! [`Client::async_execute`] or its typed wrappers. Feed inbound frames to
//! [`Client::on_message`] and report transport loss to
//! [`Client::on_disconnected`].

pub mod client;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod events;
mod handlers;
pub mod kernel;
pub mod paging;
pub mod pending;
pub mod routes;
pub mod session;
pub mod state;
pub mod timer;

pub use client::{Client, CommandArgs, ExecResult};
pub use config::KernelConfig;
pub use error::Error;
pub use events::{Classification, Event};
pub use kernel::{Kernel, KernelHandle};
pub use routes::RequestTable;
pub use session::{Priority, Session};

/// Build a [`RequestTable`] populated with every built-in route, ready to
/// pass to [`Client::new`].
pub fn default_routes() -> RequestTable {
    let mut table = RequestTable::new();
    handlers::register_builtin_routes(&mut table);
    table
}
