//! Wallet authorization handshake
//!
//! Drives the dApp's connect flow and the wallet popup it opens:
//!
//! ```text
//! NotConnected -> WalletPopupOpen -> [Locked -> unlock] -> Unlocked -> Connected
//! ```
//!
//! When no popup opens after the connect affordance is used, the wallet has
//! already authorized the dApp and the handshake goes straight to reading
//! the connected account.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::browser::wait::{probe, settle};
use crate::browser::{BrowsingContext, PageHandle, PopupAwait};
use crate::config::{Timings, UiSelectors};
use crate::{Error, Result};

/// Asks the injected provider for the connected accounts
const REQUEST_ACCOUNTS_JS: &str = "window.ethereum.request({ method: 'eth_requestAccounts' })";

pub struct Handshake<'a> {
    selectors: &'a UiSelectors,
    timings: &'a Timings,
    password: &'a SecretString,
}

impl<'a> Handshake<'a> {
    pub fn new(
        selectors: &'a UiSelectors,
        timings: &'a Timings,
        password: &'a SecretString,
    ) -> Self {
        Self {
            selectors,
            timings,
            password,
        }
    }

    /// Connect the wallet to the dApp open in `page`; returns the account the
    /// dApp reports first.
    pub async fn connect<C>(&self, context: &C, page: &C::Page) -> Result<String>
    where
        C: BrowsingContext,
    {
        let selectors = self.selectors;
        page.wait_actionable(&selectors.connect_wallet, self.timings.selector_wait())
            .await?;

        // Subscribe before any click that may open the wallet
        let mut popups = PopupAwait::from_context(context, self.timings);

        let popup = match &selectors.wallet_option {
            Some(option) => {
                page.click(&selectors.connect_wallet).await?;
                page.wait_actionable(option, self.timings.selector_wait())
                    .await?;
                info!(wallet = %option, "Choosing wallet");
                popups.after(page.click(option)).await?
            }
            None => popups.after(page.click(&selectors.connect_wallet)).await?,
        };

        match popup {
            Some(popup) => self.authorize(&popup).await?,
            None => info!("No wallet popup, dApp already authorized"),
        }

        let account = self.connected_account(page).await?;
        info!(%account, "Wallet connected");
        Ok(account)
    }

    /// Unlock if needed, then approve the connection
    async fn authorize<P: PageHandle>(&self, popup: &P) -> Result<()> {
        let selectors = self.selectors;
        info!(popup = %popup.label(), "Wallet popup opened");

        let locked = probe(
            self.timings.wait(self.timings.unlock_probe()),
            "locked indicator",
            move || popup.exists(&selectors.locked_indicator),
        )
        .await?;

        if locked {
            self.unlock(popup).await?;
        } else {
            debug!("Wallet already unlocked");
        }

        info!("Approving connection");
        popup
            .wait_actionable(&selectors.connect_button, self.timings.selector_wait())
            .await?;
        popup.click(&selectors.connect_button).await?;
        info!("Connection approved");
        Ok(())
    }

    async fn unlock<P: PageHandle>(&self, popup: &P) -> Result<()> {
        let selectors = self.selectors;

        let has_password = probe(
            self.timings.wait(self.timings.password_probe()),
            "password field",
            move || popup.exists(&selectors.password_input),
        )
        .await?;

        if !has_password {
            warn!("Wallet looks locked but shows no password field");
            return Ok(());
        }

        info!("Unlocking wallet");
        popup
            .wait_actionable(&selectors.password_input, self.timings.selector_wait())
            .await?;
        popup
            .fill(&selectors.password_input, self.password.expose_secret())
            .await?;
        popup
            .wait_actionable(&selectors.unlock_button, self.timings.selector_wait())
            .await?;
        popup.click(&selectors.unlock_button).await?;
        settle(self.timings.unlock_settle()).await;

        let unlocked = probe(
            self.timings.selector_wait(),
            "wallet unlock",
            move || async move { Ok(!popup.exists(&selectors.locked_indicator).await?) },
        )
        .await?;

        if !unlocked {
            return Err(Error::Handshake(
                "Wallet is still locked after submitting the password".to_string(),
            ));
        }
        Ok(())
    }

    async fn connected_account<P: PageHandle>(&self, page: &P) -> Result<String> {
        let accounts = page.evaluate(REQUEST_ACCOUNTS_JS).await?;
        debug!(%accounts, "Accounts reported by the dApp");
        first_account(&accounts)
    }
}

fn first_account(accounts: &Value) -> Result<String> {
    accounts
        .as_array()
        .and_then(|list| list.first())
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::Handshake(format!(
                "No connected account (provider returned {})",
                accounts
            ))
        })
}
