use std::collections::BTreeMap;
use std::sync::Arc;

use super::builder::TransactionBuilder;
use super::schemas::{Receipt, Transaction, TxStatus};
use crate::types::block::{
    calculate_mini_block_hash, extract_executed_tx_hashes, Header, MiniBlock, PoolEntry,
    TransactionPool,
};
use crate::types::AlteredAccounts;
use crate::LOGGER_MSG;

/// Groups the hashes of one miniblock into canonical transaction documents,
/// by miniblock kind.
pub(crate) struct TxsGrouper {
    builder: Arc<TransactionBuilder>,
    self_shard_id: u32,
    is_import_mode: bool,
}

impl TxsGrouper {
    pub(crate) fn new(
        builder: Arc<TransactionBuilder>,
        self_shard_id: u32,
        is_import_mode: bool,
    ) -> Self {
        Self {
            builder,
            self_shard_id,
            is_import_mode,
        }
    }

    pub(crate) fn group_normal_txs(
        &self,
        mb_index: usize,
        mb: &MiniBlock,
        header: &Header,
        pool: &TransactionPool,
        altered: &mut AlteredAccounts,
    ) -> crate::Result<BTreeMap<String, Transaction>> {
        let mut transactions = BTreeMap::new();
        let mb_hash = calculate_mini_block_hash(mb)?;

        // destination-shard view knows the outcome; the source shard
        // publishes before the destination result is known
        let status = compute_status(self.self_shard_id, mb.receiver_shard_id);

        for tx_hash in extract_executed_tx_hashes(mb_index, &mb.tx_hashes, header) {
            let raw = match pool.get(tx_hash) {
                Some(PoolEntry::Normal(raw)) => raw,
                Some(_) => {
                    tracing::warn!(
                        target: LOGGER_MSG,
                        "tx {} listed in a transactions miniblock has a different pool kind",
                        tx_hash,
                    );
                    continue;
                }
                None => {
                    tracing::warn!(target: LOGGER_MSG, "tx {} not found in pool", tx_hash);
                    continue;
                }
            };

            let tx = match self
                .builder
                .prepare_transaction(raw, tx_hash, &mb_hash, mb, header, status)
            {
                Ok(tx) => tx,
                Err(err) => {
                    tracing::warn!(target: LOGGER_MSG, "cannot build tx {}: {}", tx_hash, err);
                    continue;
                }
            };

            self.builder.add_to_altered_addresses(&tx, altered, mb, false);
            if self.should_index(mb.receiver_shard_id) {
                transactions.insert(tx_hash.clone(), tx);
            }
        }

        Ok(transactions)
    }

    /// Invalid transactions are final the moment they are grouped: full gas,
    /// full fee, no later SCR adjustment.
    pub(crate) fn group_invalid_txs(
        &self,
        mb_index: usize,
        mb: &MiniBlock,
        header: &Header,
        pool: &TransactionPool,
        altered: &mut AlteredAccounts,
    ) -> crate::Result<BTreeMap<String, Transaction>> {
        let mut transactions = BTreeMap::new();
        let mb_hash = calculate_mini_block_hash(mb)?;

        for tx_hash in extract_executed_tx_hashes(mb_index, &mb.tx_hashes, header) {
            let raw = match pool.get(tx_hash) {
                Some(PoolEntry::Invalid(raw)) => raw,
                Some(_) => {
                    tracing::warn!(
                        target: LOGGER_MSG,
                        "tx {} listed in an invalid miniblock has a different pool kind",
                        tx_hash,
                    );
                    continue;
                }
                None => {
                    tracing::warn!(target: LOGGER_MSG, "invalid tx {} not found in pool", tx_hash);
                    continue;
                }
            };

            let mut tx = match self.builder.prepare_transaction(
                raw,
                tx_hash,
                &mb_hash,
                mb,
                header,
                TxStatus::Invalid,
            ) {
                Ok(tx) => tx,
                Err(err) => {
                    tracing::warn!(target: LOGGER_MSG, "cannot build tx {}: {}", tx_hash, err);
                    continue;
                }
            };
            self.builder.charge_full_gas(&mut tx);

            self.builder.add_to_altered_addresses(&tx, altered, mb, false);
            transactions.insert(tx_hash.clone(), tx);
        }

        Ok(transactions)
    }

    pub(crate) fn group_rewards_txs(
        &self,
        mb_index: usize,
        mb: &MiniBlock,
        header: &Header,
        pool: &TransactionPool,
        altered: &mut AlteredAccounts,
    ) -> crate::Result<BTreeMap<String, Transaction>> {
        let mut rewards = BTreeMap::new();
        let mb_hash = calculate_mini_block_hash(mb)?;
        let status = compute_status(self.self_shard_id, mb.receiver_shard_id);

        for tx_hash in extract_executed_tx_hashes(mb_index, &mb.tx_hashes, header) {
            let raw = match pool.get(tx_hash) {
                Some(PoolEntry::Reward(raw)) => raw,
                Some(_) => {
                    tracing::warn!(
                        target: LOGGER_MSG,
                        "tx {} listed in a rewards miniblock has a different pool kind",
                        tx_hash,
                    );
                    continue;
                }
                None => {
                    tracing::warn!(target: LOGGER_MSG, "reward tx {} not found in pool", tx_hash);
                    continue;
                }
            };

            let tx = match self.builder.prepare_reward_transaction(
                raw,
                tx_hash,
                &mb_hash,
                mb,
                header,
                status,
            ) {
                Ok(tx) => tx,
                Err(err) => {
                    tracing::warn!(target: LOGGER_MSG, "cannot build reward {}: {}", tx_hash, err);
                    continue;
                }
            };

            self.builder.add_to_altered_addresses(&tx, altered, mb, true);
            if self.should_index(mb.receiver_shard_id) {
                rewards.insert(tx_hash.clone(), tx);
            }
        }

        Ok(rewards)
    }

    pub(crate) fn group_receipts(&self, header: &Header, pool: &TransactionPool) -> Vec<Receipt> {
        let mut receipts = Vec::new();
        for (rec_hash, raw) in pool.receipts() {
            match self.builder.prepare_receipt(rec_hash, raw, header) {
                Ok(receipt) => receipts.push(receipt),
                Err(err) => {
                    tracing::warn!(
                        target: LOGGER_MSG,
                        "cannot build receipt {}: {}",
                        rec_hash,
                        err,
                    );
                }
            }
        }

        receipts
    }

    fn should_index(&self, destination_shard_id: u32) -> bool {
        if !self.is_import_mode {
            return true;
        }

        // historical replay only rewrites documents this shard owns
        self.self_shard_id == destination_shard_id
    }
}

pub(crate) fn compute_status(self_shard_id: u32, receiver_shard_id: u32) -> TxStatus {
    if self_shard_id == receiver_shard_id {
        TxStatus::Success
    } else {
        TxStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{
        grouper_with_shard, pool_with, raw_transaction, test_header, tx_mini_block,
    };
    use super::*;
    use crate::types::block::{MiniBlockKind, RawReward};
    use crate::types::Amount;

    #[test]
    fn test_group_normal_txs_statuses_follow_shard_view() {
        let header = test_header(0);
        let mut mb = tx_mini_block(0, 1, &["aa01"]);
        mb.kind = MiniBlockKind::TxBlock;
        let pool = pool_with(&[("aa01", PoolEntry::Normal(raw_transaction(1, vec![])))]);

        // source shard: outcome unknown
        let grouper = grouper_with_shard(0, false);
        let mut altered = AlteredAccounts::new();
        let txs = grouper
            .group_normal_txs(0, &mb, &header, &pool, &mut altered)
            .unwrap();
        assert_eq!(txs["aa01"].status, TxStatus::Pending);

        // destination shard: success until proven otherwise
        let grouper = grouper_with_shard(1, false);
        let mut altered = AlteredAccounts::new();
        let txs = grouper
            .group_normal_txs(0, &mb, &header, &pool, &mut altered)
            .unwrap();
        assert_eq!(txs["aa01"].status, TxStatus::Success);
    }

    #[test]
    fn test_group_normal_txs_skips_pool_kind_mismatch() {
        let header = test_header(0);
        let mb = tx_mini_block(0, 1, &["aa01", "bb02"]);
        let pool = pool_with(&[
            ("aa01", PoolEntry::Normal(raw_transaction(1, vec![]))),
            (
                "bb02",
                PoolEntry::Reward(RawReward {
                    round: 1,
                    epoch: 0,
                    value: Amount::from(5u64),
                    receiver: crate::modules::datafield::tests::user_address(3),
                }),
            ),
        ]);

        let grouper = grouper_with_shard(0, false);
        let mut altered = AlteredAccounts::new();
        let txs = grouper
            .group_normal_txs(0, &mb, &header, &pool, &mut altered)
            .unwrap();

        assert_eq!(txs.len(), 1);
        assert!(txs.contains_key("aa01"));
    }

    #[test]
    fn test_group_invalid_txs_charges_full_gas() {
        let header = test_header(0);
        let mut mb = tx_mini_block(0, 0, &["aa01"]);
        mb.kind = MiniBlockKind::InvalidBlock;
        let pool = pool_with(&[("aa01", PoolEntry::Invalid(raw_transaction(1, vec![])))]);

        let grouper = grouper_with_shard(0, false);
        let mut altered = AlteredAccounts::new();
        let txs = grouper
            .group_invalid_txs(0, &mb, &header, &pool, &mut altered)
            .unwrap();

        let tx = &txs["aa01"];
        assert_eq!(tx.status, TxStatus::Invalid);
        assert_eq!(tx.gas_used, tx.gas_limit);
        assert_eq!(
            tx.fee.to_string(),
            (tx.gas_limit as u128 * tx.gas_price as u128).to_string()
        );
    }

    #[test]
    fn test_import_mode_skips_foreign_destinations() {
        let header = test_header(0);
        let mb = tx_mini_block(0, 1, &["aa01"]);
        let pool = pool_with(&[("aa01", PoolEntry::Normal(raw_transaction(1, vec![])))]);

        let grouper = grouper_with_shard(0, true);
        let mut altered = AlteredAccounts::new();
        let txs = grouper
            .group_normal_txs(0, &mb, &header, &pool, &mut altered)
            .unwrap();
        assert!(txs.is_empty());

        let grouper = grouper_with_shard(1, true);
        let mut altered = AlteredAccounts::new();
        let txs = grouper
            .group_normal_txs(0, &mb, &header, &pool, &mut altered)
            .unwrap();
        assert_eq!(txs.len(), 1);
    }
}
