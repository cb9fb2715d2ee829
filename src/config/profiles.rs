//! Agent profiles
//!
//! Each agent is one trader persona bound to its own browser profile and
//! DevTools port, so agents run as isolated processes.

use serde::{Deserialize, Serialize};

use crate::tokens::{addresses, TickerBook};
use crate::{Error, Result};

/// Agent used when none is named on the command line
pub const DEFAULT_AGENT_ID: &str = "Smith";

/// One automated trader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Identifier used on the command line
    pub id: String,
    /// Browser profile directory name inside the user data dir
    pub profile: String,
    /// DevTools port the agent's browser listens on
    pub port: u16,
    /// Behavioural directive handed to the decision oracle
    pub directive: String,
    /// Initial capital, in base-asset units
    pub invested: f64,
}

/// Immutable set of agent profiles keyed by id
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: Vec<AgentProfile>,
}

impl ProfileRegistry {
    /// Build from explicit profiles; duplicate ids are rejected
    pub fn new(profiles: Vec<AgentProfile>) -> Result<Self> {
        for (i, profile) in profiles.iter().enumerate() {
            if profiles[..i].iter().any(|p| p.id == profile.id) {
                return Err(Error::Config(format!("Duplicate agent id: {}", profile.id)));
            }
        }
        Ok(Self { profiles })
    }

    /// The three built-in traders
    pub fn builtin(tickers: &TickerBook) -> Self {
        let buffer = tickers.ticker_for(&addresses::EURG.to_checksum(None));
        let favorite = tickers.ticker_for(&addresses::SF_MZS.to_checksum(None));

        Self {
            profiles: vec![
                AgentProfile {
                    id: "Smith".to_string(),
                    profile: "Profile Smith".to_string(),
                    port: 9223,
                    directive: format!(
                        "You are configured as an \"aggressive\" trader who prefers frequent swaps. \
                         You like to keep some {buffer} around as a buffer for when a lucrative buy \
                         opportunity arises. Your favorite token is {favorite} and you do not miss a \
                         buy opportunity on it when the price is low relative to the other tokens."
                    ),
                    invested: 100.0,
                },
                AgentProfile {
                    id: "Scully".to_string(),
                    profile: "Profile Scully".to_string(),
                    port: 9224,
                    directive: "You are configured as a \"cautious\" trader who prefers maintaining a \
                                balanced portfolio of tokens. You stay away from big swaps and try to \
                                rebalance your portfolio one step at a time."
                        .to_string(),
                    invested: 100.0,
                },
                AgentProfile {
                    id: "007".to_string(),
                    profile: "Profile 007".to_string(),
                    port: 9225,
                    directive: "You are configured as a \"sneaky\" trader. Typically you play small, \
                                but when any token is at low price you make a big purchase. Similarly \
                                when some of your tokens hit a record price, you sell them all."
                        .to_string(),
                    invested: 200.0,
                },
            ],
        }
    }

    /// Look up an agent; unknown ids are a configuration error
    pub fn get(&self, id: &str) -> Result<&AgentProfile> {
        self.profiles
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::Config(format!("Invalid agent ID: {}", id)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
