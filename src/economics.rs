use num_bigint::BigUint;
use num_traits::CheckedSub;

use crate::config::EconomicsConfig;
use crate::interfaces::{FeeCalculator, TransactionGasHandler};
use crate::types::{numeric, Amount};

/// Linear gas-price economics: a transaction pays `gas_used * gas_price`,
/// where the base (move-balance) gas grows with the payload size. Refunds are
/// denominated in currency, so `refund / gas_price` gas units come back.
#[derive(Debug, Clone)]
pub struct GasPriceFeeCalculator {
    min_gas_limit: u64,
    gas_per_data_byte: u64,
}

impl GasPriceFeeCalculator {
    pub fn new(config: &EconomicsConfig) -> Self {
        Self {
            min_gas_limit: config.min_gas_limit,
            gas_per_data_byte: config.gas_per_data_byte,
        }
    }
}

impl FeeCalculator for GasPriceFeeCalculator {
    fn compute_gas_limit(&self, tx: &dyn TransactionGasHandler) -> u64 {
        self.min_gas_limit + self.gas_per_data_byte * tx.data().len() as u64
    }

    fn compute_fee_based_on_gas_used(
        &self,
        tx: &dyn TransactionGasHandler,
        gas_used: u64,
    ) -> Amount {
        Amount(BigUint::from(gas_used) * BigUint::from(tx.gas_price()))
    }

    fn compute_gas_used_and_fee_based_on_refund_value(
        &self,
        tx: &dyn TransactionGasHandler,
        refund_value: &Amount,
    ) -> (u64, Amount) {
        if tx.gas_price() == 0 {
            return (tx.gas_limit(), Amount::zero());
        }

        let refunded_gas = numeric::to_u64(&(&refund_value.0 / BigUint::from(tx.gas_price())))
            .unwrap_or(tx.gas_limit());
        let gas_used = tx.gas_limit().saturating_sub(refunded_gas);

        let full_fee = self.compute_fee_based_on_gas_used(tx, tx.gas_limit());
        let fee = match full_fee.0.checked_sub(&refund_value.0) {
            Some(fee) => Amount(fee),
            None => Amount::zero(),
        };

        (gas_used, fee)
    }
}
