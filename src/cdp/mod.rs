//! Chrome DevTools Protocol plumbing
//!
//! Hand-rolled transport, connection/session management and the minimal
//! set of protocol types the monitor needs.

pub mod connection;
pub mod transport;
pub mod types;

pub use connection::{Connection, Session};
pub use transport::{CdpMessage, Transport};
