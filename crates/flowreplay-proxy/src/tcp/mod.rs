//! Raw TCP capture proxy.
//!
//! Each client connection gets its own target connection. Bytes are relayed
//! both ways and accumulated per direction; when the session ends a single
//! `SOCKET` record holds everything the client sent and everything the
//! target answered.
//!
//! # Module Structure
//!
//! - `server` - TcpCaptureServer and the accept loop
//! - `session` - Relay, half-close drain and record emission

mod server;
mod session;

pub use server::TcpCaptureServer;
