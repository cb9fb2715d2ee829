//! Endpoints and secrets taken from the process environment
//!
//! ```bash
//! export API_URL="http://localhost:3000"
//! export API_KEY="..."
//! export STABLECOIN_ADDRESS="0x6C8374476006Bc20588Ebc6bEaBf1b7B05aD5925"
//! export OPENAI_SECRET_KEY="sk-..."
//! export METAMASK_PASSWORD="..."
//! ```
//!
//! A `.env` file in the working directory is loaded first by the binary.

use secrecy::SecretString;

use crate::{Error, Result};

/// Environment variable names
pub mod vars {
    pub const API_URL: &str = "API_URL";
    pub const API_KEY: &str = "API_KEY";
    pub const STABLECOIN_ADDRESS: &str = "STABLECOIN_ADDRESS";
    pub const OPENAI_SECRET_KEY: &str = "OPENAI_SECRET_KEY";
    pub const METAMASK_PASSWORD: &str = "METAMASK_PASSWORD";
}

/// Values every run needs from the environment
#[derive(Debug, Clone)]
pub struct RuntimeEnv {
    /// Market API base URL
    pub api_url: String,
    /// Sent as `x-api-key` to the market API
    pub api_key: SecretString,
    /// Base asset all prices are quoted against
    pub base_asset: String,
    pub oracle_api_key: SecretString,
    pub wallet_password: SecretString,
}

impl RuntimeEnv {
    /// Read all variables; a missing or empty one is a configuration error
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &str| -> Result<String> {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{} is not set", name)))
        };

        Ok(Self {
            api_url: require(vars::API_URL)?.trim_end_matches('/').to_string(),
            api_key: SecretString::from(require(vars::API_KEY)?),
            base_asset: require(vars::STABLECOIN_ADDRESS)?,
            oracle_api_key: SecretString::from(require(vars::OPENAI_SECRET_KEY)?),
            wallet_password: SecretString::from(require(vars::METAMASK_PASSWORD)?),
        })
    }
}
