use std::collections::BTreeMap;
use std::sync::Arc;

use super::schemas::ScResult;
use crate::interfaces::{AddressCodec, ShardCoordinator};
use crate::modules::datafield::OperationParser;
use crate::types::block::{
    calculate_mini_block_hash, Body, Header, MiniBlockKind, RawScResult, TransactionPool,
};
use crate::types::{AlteredAccount, AlteredAccounts};
use crate::LOGGER_MSG;

/// Builds canonical smart-contract-result documents, resolving miniblock and
/// shard placement from the block body rather than from the result itself,
/// which can be misleading for synthetic results.
pub(crate) struct ScResultsProcessor {
    address_codec: Arc<dyn AddressCodec + Send + Sync>,
    shard_coordinator: Arc<dyn ShardCoordinator + Send + Sync>,
    parser: Arc<OperationParser>,
}

impl ScResultsProcessor {
    pub(crate) fn new(
        address_codec: Arc<dyn AddressCodec + Send + Sync>,
        shard_coordinator: Arc<dyn ShardCoordinator + Send + Sync>,
        parser: Arc<OperationParser>,
    ) -> Self {
        Self {
            address_codec,
            shard_coordinator,
            parser,
        }
    }

    pub(crate) fn process_scrs(
        &self,
        body: &Body,
        header: &Header,
        pool: &TransactionPool,
    ) -> Vec<ScResult> {
        // some results never travel in a miniblock (generated and consumed
        // within the same shard), so the pool, not the body, is the source
        // of truth for what exists
        let mut remaining: BTreeMap<&String, &RawScResult> =
            pool.smart_contract_results().collect();
        let mut all_scrs = Vec::new();

        for mb in &body.mini_blocks {
            if mb.kind != MiniBlockKind::SmartContractResultBlock {
                continue;
            }

            let mb_hash = match calculate_mini_block_hash(mb) {
                Ok(mb_hash) => mb_hash,
                Err(err) => {
                    tracing::warn!(
                        target: LOGGER_MSG,
                        "cannot calculate scr miniblock hash: {}",
                        err,
                    );
                    continue;
                }
            };

            for scr_hash in &mb.tx_hashes {
                let raw = match remaining.remove(scr_hash) {
                    Some(raw) => raw,
                    None => {
                        tracing::warn!(
                            target: LOGGER_MSG,
                            "scr {} not found in pool",
                            scr_hash,
                        );
                        continue;
                    }
                };

                match self.prepare_sc_result(
                    scr_hash,
                    &mb_hash,
                    raw,
                    header,
                    mb.sender_shard_id,
                    mb.receiver_shard_id,
                ) {
                    Ok(scr) => all_scrs.push(scr),
                    Err(err) => {
                        tracing::warn!(
                            target: LOGGER_MSG,
                            "cannot build scr {}: {}",
                            scr_hash,
                            err,
                        );
                    }
                }
            }
        }

        // solo results: same-shard on both ends, no miniblock hash
        let self_shard_id = self.shard_coordinator.self_id();
        for (scr_hash, raw) in remaining {
            match self.prepare_sc_result(scr_hash, "", raw, header, self_shard_id, self_shard_id) {
                Ok(scr) => all_scrs.push(scr),
                Err(err) => {
                    tracing::warn!(
                        target: LOGGER_MSG,
                        "cannot build solo scr {}: {}",
                        scr_hash,
                        err,
                    );
                }
            }
        }

        all_scrs
    }

    fn prepare_sc_result(
        &self,
        scr_hash: &str,
        mb_hash: &str,
        raw: &RawScResult,
        header: &Header,
        sender_shard: u32,
        receiver_shard: u32,
    ) -> crate::Result<ScResult> {
        let response = self
            .parser
            .parse(raw.data.as_slice(), &raw.sender, &raw.receiver);

        let relayer = match &raw.relayer {
            Some(relayer) => Some(self.address_codec.encode(relayer)?),
            None => None,
        };

        Ok(ScResult {
            hash: scr_hash.to_owned(),
            mini_block_hash: mb_hash.to_owned(),
            nonce: raw.nonce,
            gas_limit: raw.gas_limit,
            gas_price: raw.gas_price,
            value: raw.value.clone(),
            sender: self.address_codec.encode(&raw.sender)?,
            receiver: self.address_codec.encode(&raw.receiver)?,
            sender_shard,
            receiver_shard,
            data: raw.data.clone(),
            prev_tx_hash: raw.prev_tx_hash.clone(),
            original_tx_hash: raw.original_tx_hash.clone(),
            call_type: raw.call_type.to_string(),
            timestamp: header.timestamp,
            operation: response.operation,
            function: response.function,
            relayer,
            relayed_value: raw.relayed_value.clone(),
            return_message: raw.return_message.clone(),
            tokens: response.tokens,
            esdt_values: response.esdt_values,
            receivers: response.receivers,
            receivers_shard_ids: response.receivers_shard_ids,
            esdt_token_identifier: String::new(),
            log: None,
        })
    }

    /// Results that credit a local account change its balance; the accounts
    /// indexer needs to know.
    pub(crate) fn add_scrs_receiver_to_altered_accounts(
        &self,
        altered: &mut AlteredAccounts,
        scrs: &[ScResult],
    ) {
        for scr in scrs {
            let receiver = match self.address_codec.decode(&scr.receiver) {
                Ok(receiver) => receiver,
                Err(_) => continue,
            };

            if self.shard_coordinator.compute_id(&receiver) != self.shard_coordinator.self_id() {
                continue;
            }

            if scr.value.is_zero() {
                // results that don't move balance are noise for the
                // accounts index
                continue;
            }

            altered.add(
                &scr.receiver,
                AlteredAccount {
                    is_sender: false,
                    balance_change: true,
                    ..AlteredAccount::default()
                },
            );
        }
    }
}
