//! DEX Browser Agent
//!
//! An LLM-driven trading agent that trades on a DEX web UI through a
//! remote-debuggable browser and the wallet extension installed in it:
//! - Attach to the agent's own browser profile over the DevTools protocol
//! - Connect the wallet to the dApp, unlocking it when needed
//! - Snapshot balances and prices, and ask an oracle what to swap
//! - Fill the swap form and confirm every wallet popup
//!
//! Each agent owns one browser profile listening on its own port. A run
//! either completes or stops at the first failed stage.

pub mod browser;
pub mod config;
pub mod journal;
pub mod market;
pub mod oracle;
pub mod runner;
pub mod swap;
pub mod tokens;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use config::{AgentProfile, Config, ProfileRegistry, RuntimeEnv, DEFAULT_AGENT_ID};
pub use error::{Error, Result};
pub use runner::{AgentRunner, RunOutcome};
pub use tokens::TickerBook;
