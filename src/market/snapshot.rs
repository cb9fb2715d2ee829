//! Market snapshot: every pool token with the account's balance and its price
//!
//! Balances are read through the provider the wallet injects into the dApp
//! page, so they reflect the chain the wallet is connected to. Tokens are
//! processed one at a time.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{token_universe, MarketData};
use crate::browser::{js_string, PageHandle};
use crate::tokens::{Amount, TickerBook, Token};
use crate::wallet::{decode_uint, encode_balance_of};
use crate::{Error, Result};

/// Token state for one run
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    /// Account balances were read for
    pub account: String,
    pub tokens: Vec<Token>,
}

impl MarketSnapshot {
    /// Tokens the account holds a nonzero amount of
    pub fn held(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| t.is_held())
    }

    pub fn get(&self, address: &str) -> Option<&Token> {
        self.tokens
            .iter()
            .find(|t| t.address.eq_ignore_ascii_case(address))
    }
}

pub struct SnapshotBuilder<'a, M: ?Sized> {
    market: &'a M,
    tickers: &'a TickerBook,
    default_decimals: u8,
}

impl<'a, M: MarketData + ?Sized> SnapshotBuilder<'a, M> {
    pub fn new(market: &'a M, tickers: &'a TickerBook, default_decimals: u8) -> Self {
        Self {
            market,
            tickers,
            default_decimals,
        }
    }

    pub async fn build<P: PageHandle>(&self, page: &P, account: &str) -> Result<MarketSnapshot> {
        let pools = self.market.pools().await?;
        let mut tokens: Vec<Token> = token_universe(&pools).into_iter().map(Token::new).collect();
        info!(pools = pools.len(), tokens = tokens.len(), "Token universe");

        for token in &mut tokens {
            let balance = self.balance_of(page, account, &token.address).await?;
            debug!(token = %self.tickers.ticker_for(&token.address), %balance, "Balance");
            token.balance = Some(balance);
        }

        for token in &mut tokens {
            token.price = self.market.price(&token.address).await?;
            if token.price.is_none() {
                debug!(token = %token.address, "No price");
            }
        }

        Ok(MarketSnapshot {
            account: account.to_string(),
            tokens,
        })
    }

    /// `balanceOf(account)` on `token`, via `eth_call` in the page
    pub async fn balance_of<P: PageHandle>(
        &self,
        page: &P,
        account: &str,
        token: &str,
    ) -> Result<Amount> {
        let data = encode_balance_of(account)?;
        let result = page.evaluate(&eth_call_script(token, &data)).await?;

        let hex = result.as_str().ok_or_else(|| {
            Error::Upstream(format!("eth_call on {} returned {}", token, result))
        })?;
        Ok(Amount::new(decode_uint(hex)?, self.decimals(token)))
    }

    fn decimals(&self, token: &str) -> u8 {
        self.tickers.decimals(token).unwrap_or_else(|| {
            warn!(
                token,
                decimals = self.default_decimals,
                "Token decimals unknown, using default"
            );
            self.default_decimals
        })
    }
}

fn eth_call_script(to: &str, data: &str) -> String {
    format!(
        "window.ethereum.request({{ method: 'eth_call', params: [{{ to: {}, data: {} }}, 'latest'] }})",
        js_string(to),
        js_string(data)
    )
}
