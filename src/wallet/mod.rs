//! Wallet extension interaction
//!
//! The wallet lives in the browser as an extension; the agent never holds a
//! key. It only drives the extension's popups and reads chain state through
//! the provider the extension injects into the dApp page.

pub mod calldata;
mod handshake;

pub use calldata::{decode_uint, encode_balance_of, BALANCE_OF_SELECTOR};
pub use handshake::Handshake;
