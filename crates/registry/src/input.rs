//! Proposed keys loaded from a deposit-data JSON file.

use crate::error::Result;
use keycheck_types::{KeyLocator, KeyRecord, WithdrawalCredentials};
use serde::Deserialize;
use tracing::warn;

/// One entry of a deposit-data file. Fields other than these are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InputKey {
    #[serde(alias = "key")]
    pub pubkey: String,
    #[serde(alias = "deposit_signature")]
    pub signature: String,
    #[serde(default, alias = "operatorId")]
    pub operator_id: Option<u64>,
}

/// Parse a deposit-data document.
pub fn parse_input_keys(json: &str) -> Result<Vec<InputKey>> {
    Ok(serde_json::from_str(json)?)
}

/// Turn parsed entries into key records, indexed by position in the file.
///
/// Withdrawal credentials come from the live registry, never from the file,
/// and every record starts out unused. Hex that does not decode yields an
/// empty field so the key is reported as malformed rather than dropped.
pub fn normalize_input_keys(
    entries: Vec<InputKey>,
    withdrawal_credentials: WithdrawalCredentials,
) -> Vec<KeyRecord> {
    entries
        .into_iter()
        .enumerate()
        .map(|(position, entry)| {
            let locator = KeyLocator::input(position as u64).with_operator(entry.operator_id);
            KeyRecord::new(
                locator,
                decode_hex(&entry.pubkey, locator, "pubkey"),
                decode_hex(&entry.signature, locator, "signature"),
                withdrawal_credentials,
                false,
            )
        })
        .collect()
}

fn decode_hex(value: &str, locator: KeyLocator, field: &str) -> Vec<u8> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits).unwrap_or_else(|err| {
        warn!(%locator, field, error = %err, "input field is not valid hex");
        Vec::new()
    })
}
