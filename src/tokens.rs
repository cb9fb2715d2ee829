//! Token metadata and per-run token state
//!
//! The `TickerBook` is the bidirectional address/ticker table for the tokens
//! listed on the DEX, together with their decimal precision. It is built once
//! and handed to the runner; nothing here is a global.

use alloy::primitives::{address, Address, U256};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Token metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// Ticker shown in the DEX UI (e.g., "EURG")
    pub ticker: String,
    /// Number of decimals used by the token contract
    pub decimals: u8,
}

impl TokenInfo {
    pub fn new(ticker: impl Into<String>, decimals: u8) -> Self {
        Self {
            ticker: ticker.into(),
            decimals,
        }
    }
}

/// Tokens listed on the DEX
pub mod addresses {
    use super::*;

    pub const SF_STS: Address = address!("0e8718b882c0e79faa9a0c923597cb25e60e2bab");
    pub const EURG: Address = address!("6c8374476006bc20588ebc6beabf1b7b05ad5925");
    pub const SF_MAP: Address = address!("f01322317e845d2b1e95e49aa792b91e578f0758");
    pub const SF_MZS: Address = address!("61d13e125c1cf535da7f978aedbab73ad70315b1");
    pub const SF_JME: Address = address!("b4f2967ced1c09bb77c391e56b849afd5302baf5");
    pub const SF_VIP: Address = address!("ca5591f68e56bea81d7575fb5825722e200d8d16");
    pub const SF_IVP: Address = address!("6d3e58d0feebac563002b1020ba2f003a058d526");
    pub const SF_MAV: Address = address!("6bc98847a29f4688c63ae890012ab07bb2bc63b8");
    pub const SF_WTS: Address = address!("712c2d3dde8de454a7aa014d21073cb4777c519f");
    pub const SF_NCO: Address = address!("1fcbc348890afdf7afdb02c6d0ee54967730f80e");
    pub const SF_SON: Address = address!("0a395e4e85abce554047256ac23713ca798db629");
    pub const SF_LRG: Address = address!("95a3188572bb9ecf5866ef0e4287c0e49c7b7f8e");
}

/// Bidirectional address/ticker lookup with decimals metadata
#[derive(Debug, Clone, Default)]
pub struct TickerBook {
    by_address: HashMap<Address, TokenInfo>,
    by_ticker: HashMap<String, Address>,
}

impl TickerBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self::default()
    }

    /// The tokens listed on the DEX. All of them use 6 decimals.
    pub fn listed() -> Self {
        use addresses::*;

        let mut book = Self::new();
        book.insert(SF_STS, TokenInfo::new("SF-STS", 6));
        book.insert(EURG, TokenInfo::new("EURG", 6));
        book.insert(SF_MAP, TokenInfo::new("SF-MAP", 6));
        book.insert(SF_MZS, TokenInfo::new("SF-MZS", 6));
        book.insert(SF_JME, TokenInfo::new("SF-JME", 6));
        book.insert(SF_VIP, TokenInfo::new("SF-VIP", 6));
        book.insert(SF_IVP, TokenInfo::new("SF-IVP", 6));
        book.insert(SF_MAV, TokenInfo::new("SF-MAV", 6));
        book.insert(SF_WTS, TokenInfo::new("SF-WTS", 6));
        book.insert(SF_NCO, TokenInfo::new("SF-NCO", 6));
        book.insert(SF_SON, TokenInfo::new("SF-SON", 6));
        book.insert(SF_LRG, TokenInfo::new("SF-LRG", 6));
        book
    }

    /// Register a token, replacing any previous entry for the address
    pub fn insert(&mut self, address: Address, info: TokenInfo) {
        if let Some(previous) = self.by_address.get(&address) {
            self.by_ticker.remove(&previous.ticker);
        }
        self.by_ticker.insert(info.ticker.clone(), address);
        self.by_address.insert(address, info);
    }

    /// Token info by address string (case-insensitive)
    pub fn get(&self, address: &str) -> Option<&TokenInfo> {
        let addr = address.parse::<Address>().ok()?;
        self.by_address.get(&addr)
    }

    /// Ticker for an address, or the address itself when unknown
    pub fn ticker_for(&self, address: &str) -> String {
        self.get(address)
            .map(|info| info.ticker.clone())
            .unwrap_or_else(|| address.to_string())
    }

    /// Checksummed address for a ticker, or the ticker itself when unknown
    pub fn address_for(&self, ticker: &str) -> String {
        self.by_ticker
            .get(ticker)
            .map(|addr| addr.to_checksum(None))
            .unwrap_or_else(|| ticker.to_string())
    }

    /// Decimals for a token, if known
    pub fn decimals(&self, address: &str) -> Option<u8> {
        self.get(address).map(|info| info.decimals)
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

/// An on-chain token amount with its decimal precision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount {
    pub raw: U256,
    pub decimals: u8,
}

impl Amount {
    pub fn new(raw: U256, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_units(self.raw, self.decimals as u32))
    }
}

impl Serialize for Amount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A token in the agent's market snapshot
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    /// Token contract address as reported by the market API
    pub address: String,
    /// Amount held by the session account
    pub balance: Option<Amount>,
    /// Price relative to the base asset
    pub price: Option<f64>,
}

impl Token {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            balance: None,
            price: None,
        }
    }

    /// Whether the account holds a nonzero amount of this token
    pub fn is_held(&self) -> bool {
        self.balance.map(|b| !b.is_zero()).unwrap_or(false)
    }
}

/// Format a U256 value with decimals
pub fn format_units(value: U256, decimals: u32) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10).pow(U256::from(decimals));
    let whole = value / divisor;
    let remainder = value % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let remainder_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = remainder_str.trim_end_matches('0');
        format!("{}.{}", whole, trimmed)
    }
}
