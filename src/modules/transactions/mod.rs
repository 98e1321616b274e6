use std::collections::BTreeMap;
use std::sync::Arc;

mod builder;
mod checkers;
mod grouper;
mod reconcile;
mod scrs;
pub mod schemas;
pub mod serialize;

use crate::errors;
use crate::interfaces::{AddressCodec, FeeCalculator, ShardCoordinator};
use crate::modules::datafield::OperationParser;
use crate::types::block::{
    should_ignore_processed_mini_block, Body, Header, MiniBlockKind, TransactionPool,
};
use crate::types::{AlteredAccounts, Amount};
use crate::LOGGER_MSG;

use builder::TransactionBuilder;
use grouper::TxsGrouper;
use reconcile::ScrsReconciler;
use schemas::{Receipt, ScResult, Transaction, TxStatus};
use scrs::ScResultsProcessor;
use serialize::BufferSlice;

/// Collaborators required to build a transactions processor.
#[derive(Clone)]
pub struct ArgsTransactionsProcessor {
    pub address_codec: Arc<dyn AddressCodec + Send + Sync>,
    pub shard_coordinator: Arc<dyn ShardCoordinator + Send + Sync>,
    pub fee_calculator: Arc<dyn FeeCalculator + Send + Sync>,
    pub is_import_mode: bool,
}

/// Everything one block's pass produces for the block-save orchestrator.
#[derive(Debug, Default)]
pub struct PreparedResults {
    pub transactions: Vec<Transaction>,
    pub sc_results: Vec<ScResult>,
    pub receipts: Vec<Receipt>,
    pub altered_accounts: AlteredAccounts,
    /// Deferred terminal statuses for documents another shard's pass owns.
    pub tx_hash_status: BTreeMap<String, TxStatus>,
    /// Deferred refunds for documents another shard's pass owns.
    pub tx_hash_refund: BTreeMap<String, Amount>,
}

/// The per-block reconciliation pipeline: group, convert results, attach,
/// finalize, collect orphan patches. Strictly sequential; every stage needs
/// the complete output of the previous one.
pub struct TransactionsProcessor {
    grouper: TxsGrouper,
    scrs_processor: ScResultsProcessor,
    reconciler: ScrsReconciler,
    self_shard_id: u32,
}

impl TransactionsProcessor {
    pub fn new(args: ArgsTransactionsProcessor) -> Self {
        let parser = Arc::new(OperationParser::new(
            args.address_codec.clone(),
            args.shard_coordinator.clone(),
        ));
        let builder = Arc::new(TransactionBuilder::new(
            args.address_codec.clone(),
            args.shard_coordinator.clone(),
            args.fee_calculator.clone(),
            parser.clone(),
        ));
        let self_shard_id = args.shard_coordinator.self_id();

        Self {
            grouper: TxsGrouper::new(builder, self_shard_id, args.is_import_mode),
            scrs_processor: ScResultsProcessor::new(
                args.address_codec,
                args.shard_coordinator,
                parser,
            ),
            reconciler: ScrsReconciler::new(args.fee_calculator),
            self_shard_id,
        }
    }

    pub fn self_shard_id(&self) -> u32 {
        self.self_shard_id
    }

    /// Either a complete result set or an error; a failed block never emits
    /// partial documents.
    pub fn prepare_transactions(
        &self,
        body: &Body,
        header: &Header,
        pool: &TransactionPool,
    ) -> crate::Result<PreparedResults> {
        check_prepare_transactions_arguments(body, header)?;

        let mut altered_accounts = AlteredAccounts::new();
        let mut normal_txs: BTreeMap<String, Transaction> = BTreeMap::new();
        let mut rewards_txs: BTreeMap<String, Transaction> = BTreeMap::new();

        for (mb_index, mb) in body.mini_blocks.iter().enumerate() {
            if should_ignore_processed_mini_block(header, mb_index) {
                continue;
            }

            match mb.kind {
                MiniBlockKind::TxBlock => {
                    match self
                        .grouper
                        .group_normal_txs(mb_index, mb, header, pool, &mut altered_accounts)
                    {
                        Ok(txs) => normal_txs.extend(txs),
                        Err(err) => {
                            tracing::warn!(target: LOGGER_MSG, "group_normal_txs: {}", err);
                            continue;
                        }
                    }
                }
                MiniBlockKind::RewardsBlock => {
                    match self
                        .grouper
                        .group_rewards_txs(mb_index, mb, header, pool, &mut altered_accounts)
                    {
                        Ok(txs) => rewards_txs.extend(txs),
                        Err(err) => {
                            tracing::warn!(target: LOGGER_MSG, "group_rewards_txs: {}", err);
                            continue;
                        }
                    }
                }
                MiniBlockKind::InvalidBlock => {
                    match self
                        .grouper
                        .group_invalid_txs(mb_index, mb, header, pool, &mut altered_accounts)
                    {
                        Ok(txs) => normal_txs.extend(txs),
                        Err(err) => {
                            tracing::warn!(target: LOGGER_MSG, "group_invalid_txs: {}", err);
                            continue;
                        }
                    }
                }
                _ => continue,
            }
        }

        set_transaction_search_order(&mut normal_txs);

        let receipts = self.grouper.group_receipts(header, pool);
        let sc_results = self.scrs_processor.process_scrs(body, header, pool);
        self.scrs_processor
            .add_scrs_receiver_to_altered_accounts(&mut altered_accounts, &sc_results);

        let scrs_without_tx = self
            .reconciler
            .attach_scrs_to_transactions(&mut normal_txs, &sc_results);
        self.reconciler
            .process_transactions_after_scrs_attached(&mut normal_txs);
        let (tx_hash_status, tx_hash_refund) =
            self.reconciler.process_scrs_without_tx(&scrs_without_tx);

        tracing::info!(
            target: LOGGER_MSG,
            "prepared block round {}: {} txs, {} rewards, {} scrs ({} orphans), {} receipts",
            header.round,
            normal_txs.len(),
            rewards_txs.len(),
            sc_results.len(),
            scrs_without_tx.len(),
            receipts.len(),
        );

        let mut transactions: Vec<Transaction> = normal_txs.into_values().collect();
        transactions.extend(rewards_txs.into_values());

        Ok(PreparedResults {
            transactions,
            sc_results,
            receipts,
            altered_accounts,
            tx_hash_status,
            tx_hash_refund,
        })
    }
}

/// One bulk request body (possibly split) for everything a pass produced.
pub fn serialize_prepared_results(
    results: &PreparedResults,
    self_shard_id: u32,
    bulk_size_threshold: usize,
) -> crate::Result<Vec<String>> {
    let mut buff = BufferSlice::new(bulk_size_threshold);

    serialize::serialize_transactions(
        &results.transactions,
        &results.tx_hash_status,
        self_shard_id,
        &mut buff,
    )?;
    serialize::serialize_tx_hash_refund(&results.tx_hash_refund, &mut buff)?;
    serialize::serialize_sc_results(&results.sc_results, &mut buff)?;
    serialize::serialize_receipts(&results.receipts, &mut buff)?;

    Ok(buff.buffers())
}

fn check_prepare_transactions_arguments(body: &Body, header: &Header) -> crate::Result<()> {
    let has_execution_windows = !header.mini_block_headers.is_empty();
    if has_execution_windows && header.mini_block_headers.len() != body.mini_blocks.len() {
        return Err(errors::ErrorKind::StructuralMismatch(format!(
            "header declares {} miniblocks, body carries {}",
            header.mini_block_headers.len(),
            body.mini_blocks.len()
        ))
        .into());
    }

    Ok(())
}

fn set_transaction_search_order(transactions: &mut BTreeMap<String, Transaction>) {
    for (order, tx) in transactions.values_mut().enumerate() {
        tx.search_order = order as u32;
    }
}
