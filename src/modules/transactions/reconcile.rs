use std::collections::BTreeMap;
use std::sync::Arc;

use super::checkers;
use super::schemas::{ScResult, Transaction, TxStatus};
use crate::interfaces::FeeCalculator;
use crate::types::Amount;

/// Attaches results to their originating transactions and derives the final
/// gas, fee and status a single pass can responsibly claim.
pub(crate) struct ScrsReconciler {
    fee_calculator: Arc<dyn FeeCalculator + Send + Sync>,
}

impl ScrsReconciler {
    pub(crate) fn new(fee_calculator: Arc<dyn FeeCalculator + Send + Sync>) -> Self {
        Self { fee_calculator }
    }

    /// Results whose originating transaction lives in another block (another
    /// shard's pass owns the document) are returned for orphan handling.
    pub(crate) fn attach_scrs_to_transactions(
        &self,
        txs: &mut BTreeMap<String, Transaction>,
        scrs: &[ScResult],
    ) -> Vec<ScResult> {
        let mut scrs_without_tx = Vec::new();

        for scr in scrs {
            match txs.get_mut(&scr.original_tx_hash) {
                Some(tx) => self.add_sc_result_info_into_tx(scr.clone(), tx),
                None => scrs_without_tx.push(scr.clone()),
            }
        }

        scrs_without_tx
    }

    fn add_sc_result_info_into_tx(&self, scr: ScResult, tx: &mut Transaction) {
        let is_refund = checkers::is_scr_for_sender_with_refund(&scr, tx)
            || checkers::is_refund_for_relayed(&scr, tx);
        let refund_value = scr.value.clone();

        tx.smart_contract_results.push(scr);

        // a relayed transaction pays its maximum gas no matter what comes
        // back later; charge it the moment the result chain appears
        if tx.is_relayed && tx.smart_contract_results.len() == 1 {
            let fee = self
                .fee_calculator
                .compute_fee_based_on_gas_used(&*tx, tx.gas_limit);
            tx.gas_used = tx.gas_limit;
            tx.fee = fee;
        }

        // status and gas fields of invalid transactions were already set
        if tx.status == TxStatus::Invalid {
            return;
        }

        if is_refund && !tx.is_relayed {
            let (gas_used, fee) = self
                .fee_calculator
                .compute_gas_used_and_fee_based_on_refund_value(&*tx, &refund_value);
            tx.gas_used = gas_used;
            tx.fee = fee;
        }
    }

    pub(crate) fn process_transactions_after_scrs_attached(
        &self,
        txs: &mut BTreeMap<String, Transaction>,
    ) {
        for tx in txs.values_mut() {
            if tx.smart_contract_results.is_empty() {
                continue;
            }

            self.fill_tx_with_scrs_fields(tx);
        }
    }

    fn fill_tx_with_scrs_fields(&self, tx: &mut Transaction) {
        tx.has_sc_results = true;

        if checkers::is_relayed_tx(tx) {
            return;
        }

        // status and gas fields of invalid transactions were already set
        if tx.status == TxStatus::Invalid {
            return;
        }

        if checkers::has_successful_scrs(tx) {
            return;
        }

        let fee = self
            .fee_calculator
            .compute_fee_based_on_gas_used(&*tx, tx.gas_limit);
        tx.gas_used = tx.gas_limit;
        tx.fee = fee;

        if checkers::has_cross_shard_pending_transfer(tx) {
            // the success marker may simply not have arrived from the next
            // shard hop yet; failing now would be premature
            return;
        }

        tx.status = TxStatus::Fail;
    }

    /// Orphan results become deferred document patches: a refund to apply and
    /// a terminal failure to record against a document this pass never
    /// loaded.
    pub(crate) fn process_scrs_without_tx(
        &self,
        scrs: &[ScResult],
    ) -> (BTreeMap<String, TxStatus>, BTreeMap<String, Amount>) {
        let mut tx_hash_status = BTreeMap::new();
        let mut tx_hash_refund = BTreeMap::new();

        for scr in scrs {
            if checkers::is_scr_with_refund(scr) {
                tx_hash_refund.insert(scr.original_tx_hash.clone(), scr.value.clone());
            }

            if checkers::is_esdt_nft_transfer_with_user_error(scr.data.as_slice()) {
                tx_hash_status.insert(scr.original_tx_hash.clone(), TxStatus::Fail);
            }
        }

        (tx_hash_status, tx_hash_refund)
    }
}
