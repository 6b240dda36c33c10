//! Channel and ledger types returned by the authenticated query helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SdkError;

/// A state channel the account participates in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: String,
    pub status: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balances: Option<Value>,
}

/// Ledger balance for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerBalance {
    pub asset: String,
    pub amount: String,
}

/// Parse a `get_channels` result. Accepts a flat list or the list wrapped in a one-element array.
pub fn parse_channels(result: Value) -> Result<Vec<Channel>, SdkError> {
    parse_list(result)
}

/// Parse a `get_ledger_balances` result.
pub fn parse_ledger_balances(result: Value) -> Result<Vec<LedgerBalance>, SdkError> {
    parse_list(result)
}

fn parse_list<T: serde::de::DeserializeOwned>(result: Value) -> Result<Vec<T>, SdkError> {
    let list = match result {
        Value::Array(mut items) if items.len() == 1 && items[0].is_array() => items.remove(0),
        Value::Null => return Ok(Vec::new()),
        other => other,
    };
    Ok(serde_json::from_value(list)?)
}
