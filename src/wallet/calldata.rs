//! ERC20 balance query payloads

use alloy::primitives::U256;

use crate::{Error, Result};

/// `balanceOf(address)` selector
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Hex calldata for `balanceOf(account)`: selector followed by the account
/// left-padded to one 32-byte word.
///
/// The account is taken as the wallet reports it; it only has to be hex of
/// at most 32 bytes.
pub fn encode_balance_of(account: &str) -> Result<String> {
    let digits = strip_hex_prefix(account).to_ascii_lowercase();

    if digits.is_empty() || digits.len() > 64 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidArgument(format!("Invalid account: {}", account)));
    }

    Ok(format!(
        "0x{}{:0>64}",
        alloy::primitives::hex::encode(BALANCE_OF_SELECTOR),
        digits
    ))
}

/// Decode an `eth_call` result as an unsigned integer. An empty result
/// (`0x`) is zero.
pub fn decode_uint(result: &str) -> Result<U256> {
    let digits = strip_hex_prefix(result.trim());
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }

    // Only the first word counts
    let word = digits.get(..digits.len().min(64)).unwrap_or(digits);
    U256::from_str_radix(word, 16)
        .map_err(|e| Error::InvalidArgument(format!("Invalid eth_call result {}: {}", result, e)))
}

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}
