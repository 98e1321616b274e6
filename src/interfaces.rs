use std::collections::BTreeMap;

use crate::types::block::TxLog;
use crate::types::{Address, Amount};

/// Gas view of a transaction record, enough for the fee calculator to work
/// on both raw pool entries and already-built documents.
pub trait TransactionGasHandler {
    fn gas_limit(&self) -> u64;
    fn gas_price(&self) -> u64;
    fn data(&self) -> &[u8];
}

/// Gas and fee math is owned by the chain's economics, not by the indexer.
pub trait FeeCalculator {
    /// Gas needed to move the balance and carry the payload, before any
    /// contract execution.
    fn compute_gas_limit(&self, tx: &dyn TransactionGasHandler) -> u64;

    fn compute_fee_based_on_gas_used(&self, tx: &dyn TransactionGasHandler, gas_used: u64)
        -> Amount;

    /// The VM reports gas consumption only implicitly, through the refund it
    /// sends back; this recovers `(gas_used, fee)` from that refund.
    fn compute_gas_used_and_fee_based_on_refund_value(
        &self,
        tx: &dyn TransactionGasHandler,
        refund_value: &Amount,
    ) -> (u64, Amount);
}

pub trait ShardCoordinator {
    fn compute_id(&self, address: &Address) -> u32;
    fn self_id(&self) -> u32;
    fn number_of_shards(&self) -> u32;
}

/// Conversion between raw address bytes and the chain's human-readable form.
pub trait AddressCodec {
    fn encode(&self, address: &Address) -> crate::Result<String>;
    fn decode(&self, encoded: &str) -> crate::Result<Address>;
    fn address_len(&self) -> usize;
}

/// Event logs cached by the node for the transactions of the current block,
/// keyed by hex-encoded transaction/SCR hash.
pub trait LogCache {
    fn get_log_from_cache(&self, tx_hash: &str) -> Option<&TxLog>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryLogCache {
    logs: BTreeMap<String, TxLog>,
}

impl InMemoryLogCache {
    pub fn new(logs: BTreeMap<String, TxLog>) -> Self {
        Self { logs }
    }
}

impl LogCache for InMemoryLogCache {
    fn get_log_from_cache(&self, tx_hash: &str) -> Option<&TxLog> {
        self.logs.get(tx_hash)
    }
}
