use std::sync::Arc;

use super::schemas::{Receipt, Transaction, TxStatus};
use crate::interfaces::{AddressCodec, FeeCalculator, ShardCoordinator};
use crate::modules::datafield::OperationParser;
use crate::types::block::{
    Header, MiniBlock, RawReceipt, RawReward, RawTransaction, ALL_SHARDS_ID, METACHAIN_SHARD_ID,
};
use crate::types::{AlteredAccount, AlteredAccounts, Amount};

const REWARDS_OPERATION: &str = "reward";

/// Turns raw pool objects into canonical documents scoped to one miniblock.
pub(crate) struct TransactionBuilder {
    address_codec: Arc<dyn AddressCodec + Send + Sync>,
    shard_coordinator: Arc<dyn ShardCoordinator + Send + Sync>,
    fee_calculator: Arc<dyn FeeCalculator + Send + Sync>,
    parser: Arc<OperationParser>,
}

impl TransactionBuilder {
    pub(crate) fn new(
        address_codec: Arc<dyn AddressCodec + Send + Sync>,
        shard_coordinator: Arc<dyn ShardCoordinator + Send + Sync>,
        fee_calculator: Arc<dyn FeeCalculator + Send + Sync>,
        parser: Arc<OperationParser>,
    ) -> Self {
        Self {
            address_codec,
            shard_coordinator,
            fee_calculator,
            parser,
        }
    }

    pub(crate) fn prepare_transaction(
        &self,
        raw: &RawTransaction,
        tx_hash: &str,
        mb_hash: &str,
        mb: &MiniBlock,
        header: &Header,
        status: TxStatus,
    ) -> crate::Result<Transaction> {
        // provisional gas view: the move-balance cost; execution gas only
        // becomes known through attached results
        let gas_used = self.fee_calculator.compute_gas_limit(raw);
        let fee = self.fee_calculator.compute_fee_based_on_gas_used(raw, gas_used);

        let response = self.parser.parse(raw.data.as_slice(), &raw.sender, &raw.receiver);

        Ok(Transaction {
            hash: tx_hash.to_owned(),
            mini_block_hash: mb_hash.to_owned(),
            nonce: raw.nonce,
            round: header.round,
            value: raw.value.clone(),
            receiver: self.address_codec.encode(&raw.receiver)?,
            sender: self.address_codec.encode(&raw.sender)?,
            receiver_shard: mb.receiver_shard_id,
            sender_shard: mb.sender_shard_id,
            gas_price: raw.gas_price,
            gas_limit: raw.gas_limit,
            gas_used,
            fee,
            data: raw.data.clone(),
            signature: hex::encode(raw.signature.as_slice()),
            timestamp: header.timestamp,
            status,
            search_order: 0,
            operation: response.operation,
            function: response.function,
            sender_username: raw.sender_username.clone(),
            receiver_username: raw.receiver_username.clone(),
            has_sc_results: false,
            is_sc_call: raw.receiver.is_smart_contract(),
            is_relayed: response.is_relayed,
            tokens: response.tokens,
            esdt_values: response.esdt_values,
            receivers: response.receivers,
            receivers_shard_ids: response.receivers_shard_ids,
            esdt_token_identifier: String::new(),
            smart_contract_results: Vec::new(),
            log: None,
            had_refund: false,
        })
    }

    pub(crate) fn prepare_reward_transaction(
        &self,
        raw: &RawReward,
        tx_hash: &str,
        mb_hash: &str,
        mb: &MiniBlock,
        header: &Header,
        status: TxStatus,
    ) -> crate::Result<Transaction> {
        Ok(Transaction {
            hash: tx_hash.to_owned(),
            mini_block_hash: mb_hash.to_owned(),
            nonce: 0,
            round: raw.round,
            value: raw.value.clone(),
            receiver: self.address_codec.encode(&raw.receiver)?,
            // the protocol itself pays rewards; the synthetic sender is the
            // coordination shard id
            sender: METACHAIN_SHARD_ID.to_string(),
            receiver_shard: mb.receiver_shard_id,
            sender_shard: mb.sender_shard_id,
            gas_price: 0,
            gas_limit: 0,
            gas_used: 0,
            fee: Amount::zero(),
            data: Default::default(),
            signature: String::new(),
            timestamp: header.timestamp,
            status,
            search_order: 0,
            operation: REWARDS_OPERATION.to_owned(),
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
        })
    }

    pub(crate) fn prepare_receipt(
        &self,
        rec_hash: &str,
        raw: &RawReceipt,
        header: &Header,
    ) -> crate::Result<Receipt> {
        Ok(Receipt {
            hash: rec_hash.to_owned(),
            value: raw.value.clone(),
            sender: self.address_codec.encode(&raw.sender)?,
            data: raw.data.clone(),
            tx_hash: raw.tx_hash.clone(),
            timestamp: header.timestamp,
        })
    }

    /// Full gas, full fee. Invalid transactions and failed executions pay
    /// for everything they asked for.
    pub(crate) fn charge_full_gas(&self, tx: &mut Transaction) {
        let fee = self
            .fee_calculator
            .compute_fee_based_on_gas_used(&*tx, tx.gas_limit);
        tx.gas_used = tx.gas_limit;
        tx.fee = fee;
    }

    /// Records which addresses this transaction touched from the local
    /// shard's point of view, annotated with the token the payload moves.
    pub(crate) fn add_to_altered_addresses(
        &self,
        tx: &Transaction,
        altered: &mut AlteredAccounts,
        mb: &MiniBlock,
        is_reward_tx: bool,
    ) {
        let self_shard_id = self.shard_coordinator.self_id();

        let is_esdt_operation = self.parser.is_esdt_operation(&tx.operation);
        let is_nft_operation = self.parser.is_nft_operation(&tx.operation);
        let token_identifier = tx.tokens.first().cloned().unwrap_or_default();

        if self_shard_id == mb.sender_shard_id && !is_reward_tx {
            altered.add(
                &tx.sender,
                AlteredAccount {
                    is_sender: true,
                    balance_change: true,
                    is_esdt_operation,
                    is_nft_operation,
                    token_identifier: token_identifier.clone(),
                    ..AlteredAccount::default()
                },
            );
        }

        let ignore_receiver = tx.status == TxStatus::Invalid || tx.sender == tx.receiver;
        if ignore_receiver {
            return;
        }

        if self_shard_id == mb.receiver_shard_id || mb.receiver_shard_id == ALL_SHARDS_ID {
            altered.add(
                &tx.receiver,
                AlteredAccount {
                    is_sender: false,
                    balance_change: true,
                    is_esdt_operation,
                    is_nft_operation,
                    token_identifier,
                    ..AlteredAccount::default()
                },
            );
        }
    }
}
