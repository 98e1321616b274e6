use crate::interfaces::TransactionGasHandler;
use crate::types::block::TxLog;
use crate::types::{Amount, HexVecU8};

/// Terminal lifecycle of an indexed transaction. Within one processing pass a
/// status is only ever tightened (pending -> success/fail); convergence across
/// passes is the serializer's job.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Success,
    Fail,
    Invalid,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Search-engine document of one transaction: the chain fields plus the
/// denormalized extras that make the document filterable.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Document id, carried outside the body.
    #[serde(skip)]
    pub hash: String,
    pub mini_block_hash: String,
    pub nonce: u64,
    pub round: u64,
    pub value: Amount,
    pub receiver: String,
    pub sender: String,
    pub receiver_shard: u32,
    pub sender_shard: u32,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub fee: Amount,
    pub data: HexVecU8,
    pub signature: String,
    pub timestamp: u64,
    pub status: TxStatus,
    pub search_order: u32,
    pub operation: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_username: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_sc_results: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_sc_call: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_relayed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub esdt_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub receivers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", rename = "receiversShardIDs")]
    pub receivers_shard_ids: Vec<u32>,
    /// Set by the NFT augmenter for token-aware filtering.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub esdt_token_identifier: String,
    /// Reconciliation state; the results are documents of their own index
    /// and never travel inside the transaction document.
    #[serde(skip)]
    pub smart_contract_results: Vec<ScResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<TxLog>,
    /// Marker consumed by the deferred refund patch so replays never apply
    /// the same refund twice.
    #[serde(default, skip_serializing_if = "is_false")]
    pub had_refund: bool,
}

impl TransactionGasHandler for Transaction {
    fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    fn gas_price(&self) -> u64 {
        self.gas_price
    }

    fn data(&self) -> &[u8] {
        self.data.as_slice()
    }
}

/// Search-engine document of one smart-contract result.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScResult {
    #[serde(skip)]
    pub hash: String,
    /// Empty for solo results that never travelled in a miniblock.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mini_block_hash: String,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub value: Amount,
    pub sender: String,
    pub receiver: String,
    pub sender_shard: u32,
    pub receiver_shard: u32,
    pub data: HexVecU8,
    pub prev_tx_hash: String,
    pub original_tx_hash: String,
    pub call_type: String,
    pub timestamp: u64,
    pub operation: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relayer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relayed_value: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub esdt_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub receivers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", rename = "receiversShardIDs")]
    pub receivers_shard_ids: Vec<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub esdt_token_identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<TxLog>,
}

/// Search-engine document of one receipt.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(skip)]
    pub hash: String,
    pub value: Amount,
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub tx_hash: String,
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_forms() {
        assert_eq!(TxStatus::Pending.to_string(), "pending");
        assert_eq!(TxStatus::Invalid.to_string(), "invalid");
        assert_eq!(
            serde_json::to_string(&TxStatus::Success).unwrap(),
            r#""success""#
        );
    }

    #[test]
    fn test_empty_optionals_stay_out_of_the_document() {
        let receipt = Receipt {
            hash: "aa".to_owned(),
            value: Amount::from(100u64),
            sender: "erd1xyz".to_owned(),
            data: None,
            tx_hash: "bb".to_owned(),
            timestamp: 1_652_000_000,
        };

        let encoded = serde_json::to_string(&receipt).unwrap();
        assert!(!encoded.contains("data"));
        assert!(!encoded.contains("\"hash\""));
        assert!(encoded.contains(r#""value":"100""#));
    }
}
