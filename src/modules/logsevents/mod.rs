use std::collections::HashSet;
use std::sync::Arc;

use crate::interfaces::{AddressCodec, LogCache, ShardCoordinator};
use crate::modules::datafield::{
    compute_token_identifier, ESDT_NFT_ADD_QUANTITY, ESDT_NFT_BURN, ESDT_NFT_CREATE,
    ESDT_NFT_TRANSFER,
};
use crate::modules::transactions::schemas::{ScResult, Transaction};
use crate::types::block::{Event, TxLog};
use crate::types::{Address, AlteredAccount, AlteredAccounts, Amount};

/// A document that can carry NFT annotations discovered in its event log.
pub(crate) trait NftOperationRecord {
    fn record_hash(&self) -> &str;
    fn set_token(&mut self, token: &str);
    fn attach_log(&mut self, log: TxLog);
}

impl NftOperationRecord for Transaction {
    fn record_hash(&self) -> &str {
        &self.hash
    }

    fn set_token(&mut self, token: &str) {
        self.esdt_token_identifier = token.to_owned();
    }

    fn attach_log(&mut self, log: TxLog) {
        self.log = Some(log);
    }
}

impl NftOperationRecord for ScResult {
    fn record_hash(&self) -> &str {
        &self.hash
    }

    fn set_token(&mut self, token: &str) {
        self.esdt_token_identifier = token.to_owned();
    }

    fn attach_log(&mut self, log: TxLog) {
        self.log = Some(log);
    }
}

/// Scans cached event logs for NFT operations, annotates the owning
/// documents and records the touched local accounts. Operates strictly after
/// attachment, so solo and attached results alike are covered.
pub struct NftLogsProcessor {
    address_codec: Arc<dyn AddressCodec + Send + Sync>,
    shard_coordinator: Arc<dyn ShardCoordinator + Send + Sync>,
    nft_operation_identifiers: HashSet<&'static str>,
}

impl NftLogsProcessor {
    pub fn new(
        address_codec: Arc<dyn AddressCodec + Send + Sync>,
        shard_coordinator: Arc<dyn ShardCoordinator + Send + Sync>,
    ) -> Self {
        Self {
            address_codec,
            shard_coordinator,
            nft_operation_identifiers: HashSet::from([
                ESDT_NFT_TRANSFER,
                ESDT_NFT_BURN,
                ESDT_NFT_ADD_QUANTITY,
                ESDT_NFT_CREATE,
            ]),
        }
    }

    pub fn process_logs_for_transactions(
        &self,
        txs: &mut [Transaction],
        log_cache: &dyn LogCache,
        altered: &mut AlteredAccounts,
    ) {
        for tx in txs.iter_mut() {
            self.process_nft_operation_log(tx, log_cache, altered);

            for scr in tx.smart_contract_results.iter_mut() {
                self.process_nft_operation_log(scr, log_cache, altered);
            }
        }
    }

    pub fn process_logs_for_scrs(
        &self,
        scrs: &mut [ScResult],
        log_cache: &dyn LogCache,
        altered: &mut AlteredAccounts,
    ) {
        for scr in scrs.iter_mut() {
            self.process_nft_operation_log(scr, log_cache, altered);
        }
    }

    fn process_nft_operation_log(
        &self,
        record: &mut impl NftOperationRecord,
        log_cache: &dyn LogCache,
        altered: &mut AlteredAccounts,
    ) {
        let log = match log_cache.get_log_from_cache(record.record_hash()) {
            Some(log) if !log.events.is_empty() => log.clone(),
            _ => return,
        };

        for event in &log.events {
            if let Some(token) = self.process_event(event, altered) {
                record.set_token(&token);
            }
        }

        record.attach_log(log);
    }

    fn process_event(&self, event: &Event, altered: &mut AlteredAccounts) -> Option<String> {
        if !self
            .nft_operation_identifiers
            .contains(event.identifier.as_str())
        {
            return None;
        }

        // topics: [token, nonce, optional receiver]
        if event.topics.len() < 2 {
            return None;
        }

        let token = match std::str::from_utf8(event.topics[0].as_slice()) {
            Ok(token) => token.to_owned(),
            Err(_) => return None,
        };
        let nonce = Amount::from_bytes_be(event.topics[1].as_slice())
            .0
            .to_u64_digits()
            .first()
            .copied()
            .unwrap_or(0);

        let is_create = event.identifier == ESDT_NFT_CREATE;
        self.mark_local_account(&event.address, &token, nonce, is_create, altered);

        if let Some(receiver_topic) = event.topics.get(2) {
            let receiver = Address::from(receiver_topic.as_slice());
            self.mark_local_account(&receiver, &token, nonce, false, altered);
        }

        Some(compute_token_identifier(&token, nonce))
    }

    fn mark_local_account(
        &self,
        address: &Address,
        token: &str,
        nonce: u64,
        is_create: bool,
        altered: &mut AlteredAccounts,
    ) {
        if self.shard_coordinator.compute_id(address) != self.shard_coordinator.self_id() {
            return;
        }

        let encoded = match self.address_codec.encode(address) {
            Ok(encoded) => encoded,
            Err(_) => return,
        };

        altered.add(
            &encoded,
            AlteredAccount {
                is_nft_operation: true,
                token_identifier: token.to_owned(),
                nft_nonce: nonce,
                is_create,
                ..AlteredAccount::default()
            },
        );
    }
}
