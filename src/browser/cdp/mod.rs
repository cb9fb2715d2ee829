//! Chrome DevTools Protocol client.
//!
//! Talks to an already running browser started with
//! `--remote-debugging-port`, over the browser-level WebSocket. Pages are
//! driven through flattened sessions multiplexed on that one socket.

mod client;
mod error;
mod protocol;
mod session;

pub use client::CdpClient;
pub use error::CdpError;
pub use protocol::{BrowserVersion, TargetInfo};
pub use session::PageSession;
