//! Configuration for the DEX browser agent

pub mod env;
pub mod profiles;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::browser::Selector;
use crate::{Error, Result};

// Re-exports
pub use env::RuntimeEnv;
pub use profiles::{AgentProfile, ProfileRegistry, DEFAULT_AGENT_ID};

/// Every wait the agent performs, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Deadline for the DevTools endpoint to answer 200
    pub probe_timeout_ms: u64,
    /// Fixed delay between readiness probes
    pub probe_interval_ms: u64,
    /// Deadline for a selector to appear
    pub selector_timeout_ms: u64,
    /// How long to wait for a popup window after its trigger
    pub popup_grace_ms: u64,
    /// Minimum time given to the triggering page before a popup is used
    pub popup_settle_ms: u64,
    /// How long to look for the wallet's locked-state indicator
    pub unlock_probe_ms: u64,
    /// How long to look for the wallet's password field
    pub password_probe_ms: u64,
    /// Minimum delay after submitting the unlock form
    pub unlock_settle_ms: u64,
    /// Minimum delay after filling the swap form
    pub form_settle_ms: u64,
    /// Minimum delay before triggering the swap
    pub swap_settle_ms: u64,
    /// Delay after the final confirmation, before teardown
    pub post_swap_settle_ms: u64,
    /// Condition polling backoff
    pub poll: BackoffSettings,
}

impl Timings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }

    pub fn popup_grace(&self) -> Duration {
        Duration::from_millis(self.popup_grace_ms)
    }

    pub fn popup_settle(&self) -> Duration {
        Duration::from_millis(self.popup_settle_ms)
    }

    pub fn unlock_probe(&self) -> Duration {
        Duration::from_millis(self.unlock_probe_ms)
    }

    pub fn password_probe(&self) -> Duration {
        Duration::from_millis(self.password_probe_ms)
    }

    pub fn unlock_settle(&self) -> Duration {
        Duration::from_millis(self.unlock_settle_ms)
    }

    pub fn form_settle(&self) -> Duration {
        Duration::from_millis(self.form_settle_ms)
    }

    pub fn swap_settle(&self) -> Duration {
        Duration::from_millis(self.swap_settle_ms)
    }

    pub fn post_swap_settle(&self) -> Duration {
        Duration::from_millis(self.post_swap_settle_ms)
    }

    /// All waits set to zero or near-zero, for driving fakes in tests
    pub fn instant() -> Self {
        Self {
            probe_timeout_ms: 200,
            probe_interval_ms: 10,
            selector_timeout_ms: 200,
            popup_grace_ms: 50,
            popup_settle_ms: 0,
            unlock_probe_ms: 50,
            password_probe_ms: 50,
            unlock_settle_ms: 0,
            form_settle_ms: 0,
            swap_settle_ms: 0,
            post_swap_settle_ms: 0,
            poll: BackoffSettings {
                initial_ms: 5,
                max_ms: 20,
                factor: 2,
            },
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 10_000,
            probe_interval_ms: 300,
            selector_timeout_ms: 10_000,
            popup_grace_ms: 10_000,
            popup_settle_ms: 1_000,
            unlock_probe_ms: 10_000,
            password_probe_ms: 5_000,
            unlock_settle_ms: 1_000,
            form_settle_ms: 3_000,
            swap_settle_ms: 3_000,
            post_swap_settle_ms: 15_000,
            poll: BackoffSettings::default(),
        }
    }
}

/// Backoff used when polling for a UI condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub factor: u32,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            initial_ms: 100,
            max_ms: 1_000,
            factor: 2,
        }
    }
}

/// Selectors for the dApp and wallet popups
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSelectors {
    /// dApp button that opens the wallet chooser
    pub connect_wallet: Selector,
    /// Wallet entry in the chooser modal, if the dApp shows one
    pub wallet_option: Option<Selector>,
    /// Element only present while the wallet is locked
    pub locked_indicator: Selector,
    pub password_input: Selector,
    pub unlock_button: Selector,
    pub connect_button: Selector,
    pub confirm_button: Selector,
    pub from_token: Selector,
    pub to_token: Selector,
    pub amount_input: Selector,
    pub approve_button: Selector,
    pub swap_button: Selector,
}

impl Default for UiSelectors {
    fn default() -> Self {
        Self {
            connect_wallet: Selector::exact_text("Connect Wallet"),
            wallet_option: Some(Selector::exact_text("MetaMask")),
            locked_indicator: Selector::css(".unlock-page__mascot-container"),
            password_input: Selector::css("input[type=\"password\"]"),
            unlock_button: Selector::has_text("button", "Unlock"),
            connect_button: Selector::has_text("button", "Connect"),
            confirm_button: Selector::has_text("button", "Confirm"),
            from_token: Selector::css(".from-swap-token select"),
            to_token: Selector::css(".to-swap-token select"),
            amount_input: Selector::css(".from-swap-amount input"),
            approve_button: Selector::css(".approve-token-button"),
            swap_button: Selector::css(".swap-token-button"),
        }
    }
}

/// How many wallet popups a single token approval produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ApprovalPolicy {
    /// Exactly `popups` confirmations; a missing popup is an error
    Fixed { popups: usize },
    /// Confirm popups as long as they keep arriving, at least one and at most `max`
    Detect { max: usize },
}

impl ApprovalPolicy {
    /// `Detect` always confirms the first popup, so its `max` must be at least 1
    pub fn validate(&self) -> Result<()> {
        match self {
            ApprovalPolicy::Detect { max: 0 } => Err(Error::Config(
                "approval.max must be at least 1 in detect mode".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        ApprovalPolicy::Fixed { popups: 2 }
    }
}

/// Decision oracle endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    /// OpenAI-compatible API base
    pub api_base: String,
    pub model: String,
    pub temperature: Option<f32>,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            // Cost-effective default; any chat model works
            model: "gpt-3.5-turbo".to_string(),
            temperature: None,
        }
    }
}

/// Browser process settings used by `--launch`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchSettings {
    pub binary: String,
    /// Directory holding every agent's browser profile
    pub user_data_dir: String,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            binary: "google-chrome".to_string(),
            user_data_dir: "chrome-profile-data".to_string(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// dApp opened in the agent's page
    pub dapp_url: String,
    /// Host the DevTools endpoints listen on
    pub control_host: String,
    /// Path probed for readiness
    pub probe_path: String,
    pub timings: Timings,
    pub selectors: UiSelectors,
    pub approval: ApprovalPolicy,
    pub oracle: OracleSettings,
    /// Decimals assumed for tokens missing from the ticker book
    pub default_decimals: u8,
    /// Path to the JSONL run journal
    pub journal_path: Option<String>,
    /// Replaces the built-in agent profiles when set
    pub profiles: Option<Vec<AgentProfile>>,
    pub chrome: LaunchSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dapp_url: "http://localhost:5001".to_string(),
            control_host: "127.0.0.1".to_string(),
            probe_path: "/json/version".to_string(),
            timings: Timings::default(),
            selectors: UiSelectors::default(),
            approval: ApprovalPolicy::default(),
            oracle: OracleSettings::default(),
            default_decimals: 6,
            journal_path: Some("agent-runs.jsonl".to_string()),
            profiles: None,
            chrome: LaunchSettings::default(),
        }
    }
}

impl Config {
    /// Load a JSON config file; missing fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.approval.validate()
    }

    /// Base URL of an agent's DevTools endpoint
    pub fn control_endpoint(&self, port: u16) -> Result<url::Url> {
        let raw = format!("http://{}:{}", self.control_host, port);
        url::Url::parse(&raw).map_err(|e| Error::Config(format!("Invalid control endpoint {}: {}", raw, e)))
    }
}
