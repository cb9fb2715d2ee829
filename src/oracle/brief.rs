//! Market brief sent to the oracle

use std::fmt::Write;

use crate::config::AgentProfile;
use crate::market::MarketSnapshot;
use crate::tokens::TickerBook;

const RESPONSE_FORMAT: &str = r#"{ "from": "0x...", "to": "0x...", "amount": "0.5", "reason": "0x... is cheap and I prefer having more of it" }"#;

/// Plain-text brief: persona, base asset, sellable holdings and prices.
///
/// Only held tokens are listed as sellable and only nonzero prices are
/// shown. Tokens known to `tickers` are labelled `TICKER (address)`.
pub fn build_brief(
    profile: &AgentProfile,
    snapshot: &MarketSnapshot,
    base_asset: &str,
    tickers: &TickerBook,
) -> String {
    let label = |address: &str| {
        let ticker = tickers.ticker_for(address);
        if ticker == address {
            address.to_string()
        } else {
            format!("{} ({})", ticker, address)
        }
    };

    let mut brief = String::new();
    let _ = writeln!(brief, "You are a crypto trading agent.\n");
    let _ = writeln!(brief, "{}\n", profile.directive);
    let _ = writeln!(brief, "The base token (stablecoin) is: {}.\n", label(base_asset));

    brief.push_str("You have these tokens available to sell (and no other):\n");
    for token in snapshot.held() {
        if let Some(balance) = token.balance {
            let _ = writeln!(brief, "- {}: {}", label(&token.address), balance);
        }
    }
    brief.push('\n');

    brief.push_str("Current token prices (relative to the base token) are:\n");
    for token in &snapshot.tokens {
        match token.price {
            Some(price) if price != 0.0 => {
                let _ = writeln!(brief, "- {}: {}", label(&token.address), price);
            }
            _ => {}
        }
    }
    brief.push('\n');

    brief.push_str(
        "Decide which token would you swap from/to the base token according to your preference, \
         holdings amount and current market state. You can only sell tokens that you already hold \
         in the wallet.\n",
    );
    brief.push_str("Respond in JSON format like:\n");
    brief.push_str(RESPONSE_FORMAT);
    brief.push('\n');
    brief
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::{addresses, Amount, Token};
    use alloy::primitives::U256;

    fn profile() -> AgentProfile {
        AgentProfile {
            id: "Test".to_string(),
            profile: "Profile Test".to_string(),
            port: 9999,
            directive: "You are configured as a \"test\" trader.".to_string(),
            invested: 100.0,
        }
    }

    fn token(address: &str, balance: u64, price: Option<f64>) -> Token {
        Token {
            address: address.to_string(),
            balance: Some(Amount::new(U256::from(balance), 6)),
            price,
        }
    }

    #[test]
    fn test_brief_lists_only_held_tokens_and_known_prices() {
        let eurg = addresses::EURG.to_checksum(None);
        let snapshot = MarketSnapshot {
            account: "0xABCD".to_string(),
            tokens: vec![
                token("0xAAA", 10_000_000, Some(2.0)),
                token("0xBBB", 0, Some(0.0)),
                token("0xCCC", 0, None),
                token(&eurg, 1_500_000, Some(1.0)),
            ],
        };

        let brief = build_brief(&profile(), &snapshot, &eurg, &TickerBook::listed());

        assert!(brief.starts_with(
            "You are a crypto trading agent.\n\nYou are configured as a \"test\" trader."
        ));
        assert!(brief.contains(&format!("The base token (stablecoin) is: EURG ({}).", eurg)));
        assert!(brief.contains("- 0xAAA: 10\n"));
        assert!(brief.contains(&format!("- EURG ({}): 1.5\n", eurg)));
        assert!(brief.contains("- 0xAAA: 2\n"));
        assert!(!brief.contains("0xBBB"));
        assert!(!brief.contains("0xCCC"));
        assert!(brief.ends_with(&format!("{}\n", RESPONSE_FORMAT)));
    }
}
