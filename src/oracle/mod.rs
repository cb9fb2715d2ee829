//! Decision oracle
//!
//! The oracle is a language model: it gets a plain-text market brief and
//! answers with free text that embeds a JSON trade decision. The decision is
//! handed to the swap executor as-is, without any sanity checks.

mod brief;
mod openai;

pub use brief::build_brief;
pub use openai::OpenAiOracle;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::tokens::TickerBook;
use crate::{Error, Result};

/// Something that answers a brief with text
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn ask(&self, brief: &str) -> Result<String>;
}

/// A proposed swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeDecision {
    /// Token to sell
    pub from: String,
    /// Token to buy
    pub to: String,
    /// Amount of `from`, as a decimal string
    pub amount: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    from: String,
    to: String,
    amount: Value,
    #[serde(default)]
    reason: String,
}

/// Ask `oracle` and parse its answer
pub async fn decide<O>(oracle: &O, brief: &str, tickers: &TickerBook) -> Result<TradeDecision>
where
    O: DecisionOracle + ?Sized,
{
    let answer = oracle.ask(brief).await?;
    let decision = parse_decision(&answer, tickers)?;
    info!(
        from = %tickers.ticker_for(&decision.from),
        to = %tickers.ticker_for(&decision.to),
        amount = %decision.amount,
        reason = %decision.reason,
        "Decision"
    );
    Ok(decision)
}

/// Parse the JSON object embedded in an oracle answer.
///
/// Tickers in `from`/`to` are resolved to addresses; anything else is kept
/// verbatim. `amount` may be a string or a number.
pub fn parse_decision(answer: &str, tickers: &TickerBook) -> Result<TradeDecision> {
    let json = embedded_object(answer)
        .ok_or_else(|| Error::DecisionParse(format!("No JSON object in answer: {}", answer)))?;

    let raw: RawDecision = serde_json::from_str(json)
        .map_err(|e| Error::DecisionParse(format!("{}: {}", e, json)))?;

    let amount = match raw.amount {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(Error::DecisionParse(format!("Invalid amount: {}", other)));
        }
    };

    Ok(TradeDecision {
        from: tickers.address_for(raw.from.trim()),
        to: tickers.address_for(raw.to.trim()),
        amount,
        reason: raw.reason,
    })
}

/// Outermost `{ ... }` span of `text`
fn embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
