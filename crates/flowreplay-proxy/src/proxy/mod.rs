//! HTTP capture proxy.
//!
//! Every inbound request is forwarded to the fixed target, the exchange is
//! recorded, and the captured response is returned to the client. An
//! upstream failure is still recorded, as a synthesized 500.
//!
//! # Module Structure
//!
//! - `server` - HttpCaptureServer and the accept loop
//! - `handler` - Per-request forwarding, recording and response mirroring

mod handler;
mod server;


pub use server::HttpCaptureServer;
