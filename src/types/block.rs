use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::types::{Address, Amount, HexVecU8};
use crate::{errors, LOGGER_MSG};

/// Shard id of the coordination (meta) chain. Reward transactions carry it as
/// their synthetic sender.
pub const METACHAIN_SHARD_ID: u32 = u32::MAX;

/// Receiver shard id of miniblocks addressed to every shard at once.
pub const ALL_SHARDS_ID: u32 = u32::MAX - 1;

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
pub enum MiniBlockKind {
    TxBlock,
    SmartContractResultBlock,
    InvalidBlock,
    RewardsBlock,
    ReceiptBlock,
    PeerBlock,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
)]
pub enum ProcessingKind {
    #[default]
    Normal,
    Scheduled,
    /// Already executed in an earlier scheduled pass; the miniblock appears
    /// again for bookkeeping only and must not be re-indexed.
    Processed,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiniBlock {
    pub sender_shard_id: u32,
    pub receiver_shard_id: u32,
    pub kind: MiniBlockKind,
    /// Hex-encoded transaction hashes, in execution order.
    pub tx_hashes: Vec<String>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    pub mini_blocks: Vec<MiniBlock>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiniBlockHeader {
    pub first_processed: i32,
    pub last_processed: i32,
    #[serde(default)]
    pub processing_kind: ProcessingKind,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub nonce: u64,
    pub round: u64,
    pub epoch: u32,
    pub shard_id: u32,
    pub timestamp: u64,
    /// One entry per miniblock of the body; empty for headers produced before
    /// execution windows existed.
    #[serde(default)]
    pub mini_block_headers: Vec<MiniBlockHeader>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub nonce: u64,
    pub value: Amount,
    pub sender: Address,
    pub receiver: Address,
    pub gas_price: u64,
    pub gas_limit: u64,
    #[serde(default)]
    pub data: HexVecU8,
    #[serde(default)]
    pub signature: HexVecU8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_username: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReward {
    pub round: u64,
    pub epoch: u32,
    pub value: Amount,
    pub receiver: Address,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScResult {
    pub nonce: u64,
    pub value: Amount,
    pub sender: Address,
    pub receiver: Address,
    pub gas_price: u64,
    pub gas_limit: u64,
    #[serde(default)]
    pub data: HexVecU8,
    /// Hex-encoded hash of the immediate predecessor hop.
    pub prev_tx_hash: String,
    /// Hex-encoded hash of the root transaction; stable across every hop.
    pub original_tx_hash: String,
    pub call_type: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relayer: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relayed_value: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_message: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    pub value: Amount,
    pub sender: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub tx_hash: String,
}

/// One entry of the per-block transaction pool, tagged with its kind at
/// ingestion so downstream grouping switches on the variant instead of
/// guessing what a raw handler might be.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PoolEntry {
    Normal(RawTransaction),
    Invalid(RawTransaction),
    Reward(RawReward),
    SmartContractResult(RawScResult),
    Receipt(RawReceipt),
}

/// Pool of every raw object delivered with the block, keyed by hex hash.
/// A sorted map keeps every derived artifact (solo SCR order, receipts,
/// search order) byte-stable across replays.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TransactionPool {
    pub entries: BTreeMap<String, PoolEntry>,
}

impl TransactionPool {
    pub fn get(&self, hash: &str) -> Option<&PoolEntry> {
        self.entries.get(hash)
    }

    pub fn smart_contract_results(&self) -> impl Iterator<Item = (&String, &RawScResult)> {
        self.entries.iter().filter_map(|(hash, entry)| match entry {
            PoolEntry::SmartContractResult(scr) => Some((hash, scr)),
            _ => None,
        })
    }

    pub fn receipts(&self) -> impl Iterator<Item = (&String, &RawReceipt)> {
        self.entries.iter().filter_map(|(hash, entry)| match entry {
            PoolEntry::Receipt(receipt) => Some((hash, receipt)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub address: Address,
    pub identifier: String,
    #[serde(default)]
    pub topics: Vec<HexVecU8>,
    #[serde(default)]
    pub data: HexVecU8,
}

/// Event log of one transaction or smart-contract result, as cached by the
/// log collaborator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxLog {
    pub address: Address,
    pub events: Vec<Event>,
}

impl crate::interfaces::TransactionGasHandler for RawTransaction {
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

/// Miniblock hashes are computed over the deterministic binary encoding of
/// the miniblock, the same way the chain derives them.
pub fn calculate_mini_block_hash(mini_block: &MiniBlock) -> crate::Result<String> {
    let marshaled = bincode::serialize(mini_block).map_err(errors::ErrorKind::from)?;

    let mut hasher = Sha256::new();
    hasher.update(&marshaled);

    Ok(hex::encode(hasher.finalize()))
}

/// Restrict a miniblock's hashes to the execution window the header declares
/// for it. Headers without per-miniblock entries execute everything.
pub fn extract_executed_tx_hashes<'a>(
    mb_index: usize,
    tx_hashes: &'a [String],
    header: &Header,
) -> Vec<&'a String> {
    let mb_header = match header.mini_block_headers.get(mb_index) {
        Some(mb_header) => mb_header,
        None => return tx_hashes.iter().collect(),
    };

    tx_hashes
        .iter()
        .enumerate()
        .filter(|(tx_index, _)| {
            *tx_index as i32 >= mb_header.first_processed
                && *tx_index as i32 <= mb_header.last_processed
        })
        .map(|(_, hash)| hash)
        .collect()
}

pub fn should_ignore_processed_mini_block(header: &Header, mb_index: usize) -> bool {
    let ignore = header
        .mini_block_headers
        .get(mb_index)
        .map(|mb_header| mb_header.processing_kind == ProcessingKind::Processed)
        .unwrap_or(false);

    if ignore {
        tracing::debug!(
            target: LOGGER_MSG,
            "miniblock {} was already executed in a scheduled pass, skipping",
            mb_index,
        );
    }

    ignore
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mini_block(hashes: &[&str]) -> MiniBlock {
        MiniBlock {
            sender_shard_id: 0,
            receiver_shard_id: 1,
            kind: MiniBlockKind::TxBlock,
            tx_hashes: hashes.iter().map(|h| h.to_string()).collect(),
        }
    }

    #[test]
    fn test_mini_block_hash_is_stable() {
        let mb = mini_block(&["aa01", "bb02"]);
        let first = calculate_mini_block_hash(&mb).unwrap();
        let second = calculate_mini_block_hash(&mb).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);

        let other = mini_block(&["aa01"]);
        assert_ne!(calculate_mini_block_hash(&other).unwrap(), first);
    }

    #[test]
    fn test_extract_executed_tx_hashes_without_window() {
        let mb = mini_block(&["aa", "bb", "cc"]);
        let header = Header::default();
        let executed = extract_executed_tx_hashes(0, &mb.tx_hashes, &header);
        assert_eq!(executed.len(), 3);
    }

    #[test]
    fn test_extract_executed_tx_hashes_with_window() {
        let mb = mini_block(&["aa", "bb", "cc"]);
        let header = Header {
            mini_block_headers: vec![MiniBlockHeader {
                first_processed: 1,
                last_processed: 1,
                processing_kind: ProcessingKind::Normal,
            }],
            ..Header::default()
        };

        let executed = extract_executed_tx_hashes(0, &mb.tx_hashes, &header);
        assert_eq!(executed, vec![&"bb".to_string()]);
    }

    #[test]
    fn test_should_ignore_processed_mini_block() {
        let header = Header {
            mini_block_headers: vec![MiniBlockHeader {
                first_processed: 0,
                last_processed: 0,
                processing_kind: ProcessingKind::Processed,
            }],
            ..Header::default()
        };

        assert!(should_ignore_processed_mini_block(&header, 0));
        assert!(!should_ignore_processed_mini_block(&header, 1));
    }
}
