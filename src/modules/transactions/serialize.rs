use std::collections::BTreeMap;

use super::checkers;
use super::schemas::{Receipt, ScResult, Transaction, TxStatus};
use crate::types::{Amount, HexVecU8};
use crate::LOGGER_MSG;

/// How one transaction document is allowed to touch whatever an earlier pass
/// (possibly from another shard) already wrote. One painless template per
/// shape keeps the merge semantics auditable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxUpdateShape {
    /// Cross-shard seen from the source: create the document if absent and
    /// never overwrite an existing one, the destination knows better.
    KeepExisting,
    /// Destination, intra-shard or invalid view: merge only the outcome
    /// fields into the document the source pass may have created.
    MergeOutcome,
    /// Same-shard token transfer with results: replace the document but keep
    /// a status the cross-shard path already tightened.
    PreserveStatus,
}

const RETURN_SCRIPT: &str = "return";

const MERGE_OUTCOME_SCRIPT: &str = "ctx._source.status = params.tx.status; \
     ctx._source.miniBlockHash = params.tx.miniBlockHash; \
     ctx._source.timestamp = params.tx.timestamp; \
     ctx._source.gasUsed = params.tx.gasUsed; \
     ctx._source.fee = params.tx.fee; \
     if (params.tx.log != null) { ctx._source.log = params.tx.log; } \
     if (params.tx.hasScResults != null) { ctx._source.hasScResults = params.tx.hasScResults; }";

const PRESERVE_STATUS_SCRIPT: &str = "def status = ctx._source.status; \
     ctx._source = params.tx; \
     ctx._source.status = status;";

const STATUS_PATCH_SCRIPT: &str = "ctx._source.status = params.status";

const REFUND_PATCH_SCRIPT: &str = "if ('create' == ctx.op) { ctx.op = 'noop' } \
     else if (!ctx._source.containsKey('hadRefund') || !ctx._source.hadRefund) { \
     BigInteger fee = new BigInteger(ctx._source.fee); \
     BigInteger refund = new BigInteger(params.refund); \
     if (fee.compareTo(refund) > 0) { ctx._source.fee = fee.subtract(refund).toString(); } \
     if (ctx._source.gasPrice != 0) { ctx._source.gasUsed -= refund.divide(BigInteger.valueOf((long) ctx._source.gasPrice)).longValue(); } \
     ctx._source.hadRefund = true; }";

impl TxUpdateShape {
    pub(crate) fn for_transaction(tx: &Transaction, self_shard_id: u32) -> Self {
        if checkers::is_cross_shard_on_source_shard(tx, self_shard_id) {
            return Self::KeepExisting;
        }

        if checkers::is_nft_transfer_or_multi_transfer(tx) {
            return Self::PreserveStatus;
        }

        Self::MergeOutcome
    }

    fn script_source(&self) -> &'static str {
        match self {
            Self::KeepExisting => RETURN_SCRIPT,
            Self::MergeOutcome => MERGE_OUTCOME_SCRIPT,
            Self::PreserveStatus => PRESERVE_STATUS_SCRIPT,
        }
    }
}

/// NDJSON bulk bodies, split whenever one would grow past the threshold.
#[derive(Debug)]
pub struct BufferSlice {
    buffers: Vec<String>,
    bulk_size_threshold: usize,
}

impl BufferSlice {
    pub fn new(bulk_size_threshold: usize) -> Self {
        Self {
            buffers: Vec::new(),
            bulk_size_threshold,
        }
    }

    pub fn put_data(&mut self, meta: &str, serialized_data: &str) {
        let entry_len = meta.len() + serialized_data.len() + 2;
        let needs_new_buffer = match self.buffers.last() {
            None => true,
            Some(current) => {
                !current.is_empty() && current.len() + entry_len > self.bulk_size_threshold
            }
        };
        if needs_new_buffer {
            self.buffers.push(String::new());
        }

        if let Some(current) = self.buffers.last_mut() {
            current.push_str(meta);
            current.push('\n');
            if !serialized_data.is_empty() {
                current.push_str(serialized_data);
                current.push('\n');
            }
        }
    }

    pub fn buffers(self) -> Vec<String> {
        self.buffers
    }
}

/// Transactions plus the deferred status patches for documents other shards
/// own.
pub fn serialize_transactions(
    transactions: &[Transaction],
    tx_hash_status: &BTreeMap<String, TxStatus>,
    self_shard_id: u32,
    buff: &mut BufferSlice,
) -> crate::Result<()> {
    for tx in transactions {
        let (meta, serialized_data) = prepare_serialized_data_for_a_transaction(tx, self_shard_id)?;
        buff.put_data(&meta, &serialized_data);
    }

    serialize_tx_hash_status(tx_hash_status, buff)?;

    Ok(())
}

fn prepare_serialized_data_for_a_transaction(
    tx: &Transaction,
    self_shard_id: u32,
) -> crate::Result<(String, String)> {
    let meta = serde_json::json!({"update": {"_id": tx.hash}}).to_string();
    let tx_value = serde_json::to_value(tx).map_err(crate::errors::ErrorKind::from)?;

    let shape = TxUpdateShape::for_transaction(tx, self_shard_id);
    tracing::trace!(
        target: LOGGER_MSG,
        "tx {} serialized with shape {:?}",
        tx.hash,
        shape,
    );

    let serialized_data = match shape {
        TxUpdateShape::KeepExisting => serde_json::json!({
            "script": {"source": shape.script_source()},
            "upsert": tx_value,
        }),
        TxUpdateShape::MergeOutcome | TxUpdateShape::PreserveStatus => serde_json::json!({
            "script": {
                "lang": "painless",
                "params": {"tx": tx_value.clone()},
                "source": shape.script_source(),
            },
            "upsert": tx_value,
        }),
    };

    Ok((meta, serialized_data.to_string()))
}

fn serialize_tx_hash_status(
    tx_hash_status: &BTreeMap<String, TxStatus>,
    buff: &mut BufferSlice,
) -> crate::Result<()> {
    for (tx_hash, status) in tx_hash_status {
        let meta = serde_json::json!({"update": {"_id": tx_hash}}).to_string();

        let stub = stub_transaction(*status);
        let stub_value = serde_json::to_value(&stub).map_err(crate::errors::ErrorKind::from)?;

        let serialized_data = serde_json::json!({
            "script": {
                "lang": "painless",
                "params": {"status": status},
                "source": STATUS_PATCH_SCRIPT,
            },
            "upsert": stub_value,
        });

        buff.put_data(&meta, &serialized_data.to_string());
    }

    Ok(())
}

/// Deferred refund patches: the math happens inside the script because the
/// originating transaction is not in this batch.
pub fn serialize_tx_hash_refund(
    tx_hash_refund: &BTreeMap<String, Amount>,
    buff: &mut BufferSlice,
) -> crate::Result<()> {
    for (tx_hash, refund_value) in tx_hash_refund {
        let meta = serde_json::json!({"update": {"_id": tx_hash}}).to_string();

        let serialized_data = serde_json::json!({
            "script": {
                "lang": "painless",
                "params": {"refund": refund_value},
                "source": REFUND_PATCH_SCRIPT,
            },
            "scripted_upsert": true,
            "upsert": {},
        });

        buff.put_data(&meta, &serialized_data.to_string());
    }

    Ok(())
}

/// Results have no cross-shard counterpart, so they are plain inserts.
pub fn serialize_sc_results(sc_results: &[ScResult], buff: &mut BufferSlice) -> crate::Result<()> {
    for scr in sc_results {
        let meta = serde_json::json!({"index": {"_id": scr.hash}}).to_string();
        let serialized_data =
            serde_json::to_string(scr).map_err(crate::errors::ErrorKind::from)?;

        buff.put_data(&meta, &serialized_data);
    }

    Ok(())
}

pub fn serialize_receipts(receipts: &[Receipt], buff: &mut BufferSlice) -> crate::Result<()> {
    for receipt in receipts {
        let meta = serde_json::json!({"index": {"_id": receipt.hash}}).to_string();
        let serialized_data =
            serde_json::to_string(receipt).map_err(crate::errors::ErrorKind::from)?;

        buff.put_data(&meta, &serialized_data);
    }

    Ok(())
}

/// Minimal upsert body for a deferred status patch: a zero-valued document
/// carrying only the verdict, in case the owning pass has not landed yet.
fn stub_transaction(status: TxStatus) -> Transaction {
    Transaction {
        hash: String::new(),
        mini_block_hash: String::new(),
        nonce: 0,
        round: 0,
        value: Amount::zero(),
        receiver: String::new(),
        sender: String::new(),
        receiver_shard: 0,
        sender_shard: 0,
        gas_price: 0,
        gas_limit: 0,
        gas_used: 0,
        fee: Amount::zero(),
        data: HexVecU8::default(),
        signature: String::new(),
        timestamp: 0,
        status,
        search_order: 0,
        operation: String::new(),
        function: String::new(),
        sender_username: None,
        receiver_username: None,
        has_sc_results: false,
        is_sc_call: false,
        is_relayed: false,
        tokens: Vec::new(),
        esdt_values: Vec::new(),
        receivers: Vec::new(),
        receivers_shard_ids: Vec::new(),
        esdt_token_identifier: String::new(),
        smart_contract_results: Vec::new(),
        log: None,
        had_refund: false,
    }
}

#[cfg(test)]
pub(crate) mod merge {
    //! In-memory model of how the search engine applies the emitted bulk
    //! instructions, keyed on the typed templates above. Lets the tests
    //! replay passes in any order against a blank index.

    use std::collections::BTreeMap;
    use std::str::FromStr;

    use num_bigint::BigUint;
    use serde_json::Value;

    use super::*;

    pub(crate) fn apply(index: &mut BTreeMap<String, Value>, meta: &str, body: &str) {
        let meta: Value = serde_json::from_str(meta).unwrap();

        if let Some(action) = meta.get("index") {
            let id = action["_id"].as_str().unwrap().to_owned();
            index.insert(id, serde_json::from_str(body).unwrap());
            return;
        }

        let id = meta["update"]["_id"].as_str().unwrap().to_owned();
        let body: Value = serde_json::from_str(body).unwrap();
        let source = body["script"]["source"].as_str().unwrap();

        if !index.contains_key(&id) {
            if source == REFUND_PATCH_SCRIPT {
                // scripted upsert turns into a noop on create
                return;
            }
            index.insert(id, body["upsert"].clone());
            return;
        }

        let doc = index.get_mut(&id).unwrap();

        if source == RETURN_SCRIPT {
            return;
        }

        if source == MERGE_OUTCOME_SCRIPT {
            let params = &body["script"]["params"]["tx"];
            for field in ["status", "miniBlockHash", "timestamp", "gasUsed", "fee"] {
                doc[field] = params[field].clone();
            }
            for field in ["log", "hasScResults"] {
                if !params[field].is_null() {
                    doc[field] = params[field].clone();
                }
            }
            return;
        }

        if source == PRESERVE_STATUS_SCRIPT {
            let status = doc["status"].clone();
            *doc = body["script"]["params"]["tx"].clone();
            doc["status"] = status;
            return;
        }

        if source == STATUS_PATCH_SCRIPT {
            doc["status"] = body["script"]["params"]["status"].clone();
            return;
        }

        if source == REFUND_PATCH_SCRIPT {
            if doc.get("hadRefund").and_then(Value::as_bool) == Some(true) {
                return;
            }

            let refund = BigUint::from_str(body["script"]["params"]["refund"].as_str().unwrap())
                .unwrap();
            let fee = BigUint::from_str(doc["fee"].as_str().unwrap()).unwrap();
            if fee > refund {
                doc["fee"] = Value::String((fee - refund.clone()).to_string());
            }

            let gas_price = doc["gasPrice"].as_u64().unwrap();
            if gas_price != 0 {
                let refunded_gas: u64 = (refund / BigUint::from(gas_price))
                    .to_u64_digits()
                    .first()
                    .copied()
                    .unwrap_or(0);
                let gas_used = doc["gasUsed"].as_u64().unwrap();
                doc["gasUsed"] = Value::from(gas_used.saturating_sub(refunded_gas));
            }

            doc["hadRefund"] = Value::Bool(true);
            return;
        }

        panic!("unknown script source: {}", source);
    }

    pub(crate) fn apply_ndjson(index: &mut BTreeMap<String, Value>, ndjson: &str) {
        let lines: Vec<&str> = ndjson.lines().collect();
        for pair in lines.chunks(2) {
            apply(index, pair[0], pair[1]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{test_scr_doc, test_tx_doc};
    use super::*;

    #[test]
    fn test_update_shape_selection() {
        // cross-shard seen from the source
        let tx = test_tx_doc("aa01", 1, 0, 1);
        assert_eq!(
            TxUpdateShape::for_transaction(&tx, 0),
            TxUpdateShape::KeepExisting
        );

        // same document seen from the destination
        assert_eq!(
            TxUpdateShape::for_transaction(&tx, 1),
            TxUpdateShape::MergeOutcome
        );

        // same-shard token transfer with attached results
        let mut nft = test_tx_doc("bb02", 1, 0, 0);
        nft.data = b"ESDTNFTTransfer@aa@01@01@bb".to_vec().into();
        nft.smart_contract_results = vec![test_scr_doc("cc03", "bb02", "bb02", vec![])];
        assert_eq!(
            TxUpdateShape::for_transaction(&nft, 0),
            TxUpdateShape::PreserveStatus
        );

        // intra-shard without token data
        let plain = test_tx_doc("dd04", 1, 0, 0);
        assert_eq!(
            TxUpdateShape::for_transaction(&plain, 0),
            TxUpdateShape::MergeOutcome
        );
    }

    #[test]
    fn test_serialization_is_byte_identical_between_replays() {
        let tx = test_tx_doc("aa01", 1, 0, 1);
        let statuses = BTreeMap::from([("ff99".to_owned(), TxStatus::Fail)]);

        let mut first = BufferSlice::new(0x4000);
        serialize_transactions(&[tx.clone()], &statuses, 0, &mut first).unwrap();
        let mut second = BufferSlice::new(0x4000);
        serialize_transactions(&[tx], &statuses, 0, &mut second).unwrap();

        assert_eq!(first.buffers(), second.buffers());
    }

    #[test]
    fn test_sc_results_and_receipts_are_plain_inserts() {
        let scr = test_scr_doc("cc03", "aa01", "aa01", b"@6f6b".to_vec());
        let mut buff = BufferSlice::new(0x4000);
        serialize_sc_results(&[scr], &mut buff).unwrap();

        let receipt = Receipt {
            hash: "ee05".to_owned(),
            value: Amount::from(50u64),
            sender: "erd1aaa".to_owned(),
            data: None,
            tx_hash: "aa01".to_owned(),
            timestamp: 1,
        };
        serialize_receipts(&[receipt], &mut buff).unwrap();

        let buffers = buff.buffers();
        assert_eq!(buffers.len(), 1);
        let lines: Vec<&str> = buffers[0].lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains(r#""index""#));
        assert!(lines[2].contains(r#""index""#));
        assert!(lines[2].contains("ee05"));
    }

    #[test]
    fn test_buffer_splits_at_threshold() {
        let mut buff = BufferSlice::new(64);
        for _ in 0..4 {
            buff.put_data(r#"{"index":{"_id":"x"}}"#, r#"{"field":"0123456789"}"#);
        }

        let buffers = buff.buffers();
        assert!(buffers.len() > 1);
        for buffer in &buffers {
            assert!(buffer.ends_with('\n'));
        }
    }

    #[test]
    fn test_orphan_patches_apply_against_existing_document() {
        use serde_json::Value;

        // a destination-pass document is already in the index
        let mut tx = test_tx_doc("aa01", 79, 0, 1);
        tx.gas_limit = 5_000_000;
        tx.gas_price = 1_000_000_000;
        tx.gas_used = 5_000_000;
        tx.fee = Amount::from(5_000_000_000_000_000u64);
        let mut index = BTreeMap::new();
        let mut buff = BufferSlice::new(0x40000);
        serialize_transactions(&[tx], &BTreeMap::new(), 1, &mut buff).unwrap();
        for buffer in buff.buffers() {
            merge::apply_ndjson(&mut index, &buffer);
        }

        // a later pass on another shard saw only the refund
        let refunds =
            BTreeMap::from([("aa01".to_owned(), Amount::from(40_365_000_000_000u64))]);
        let mut buff = BufferSlice::new(0x40000);
        serialize_tx_hash_refund(&refunds, &mut buff).unwrap();
        let patch = buff.buffers().remove(0);

        merge::apply_ndjson(&mut index, &patch);
        let doc = &index["aa01"];
        assert_eq!(doc["gasUsed"].as_u64(), Some(4_959_635));
        assert_eq!(doc["fee"], Value::String("4959635000000000".to_owned()));
        assert_eq!(doc["hadRefund"], Value::Bool(true));

        // replaying the same patch is a no-op
        merge::apply_ndjson(&mut index, &patch);
        assert_eq!(index["aa01"]["gasUsed"].as_u64(), Some(4_959_635));
        assert_eq!(index["aa01"]["fee"], Value::String("4959635000000000".to_owned()));

        // the patch alone never creates a document
        let mut blank = BTreeMap::new();
        merge::apply_ndjson(&mut blank, &patch);
        assert!(blank.is_empty());
    }

    #[test]
    fn test_status_patch_creates_stub_when_document_is_missing() {
        let statuses = BTreeMap::from([("aa01".to_owned(), TxStatus::Fail)]);
        let mut buff = BufferSlice::new(0x4000);
        serialize_transactions(&[], &statuses, 0, &mut buff).unwrap();

        let mut index = BTreeMap::new();
        merge::apply_ndjson(&mut index, &buff.buffers()[0]);

        assert_eq!(index["aa01"]["status"], "fail");
    }
}
