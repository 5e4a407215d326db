//! Assembly of unsigned EIP-1559 transactions from live network state.
//!
//! [`TransactionBuilder::build`] queries the node in a fixed order (chain id,
//! gas estimate, nonce, gas price) and fails on the first error. Nothing is
//! returned half-built.
//!
//! Fee policy is flat: the tip is a fixed floor and the fee cap is
//! the node's current gas price, raised to the tip when the node quotes less
//! (dev chains often report a gas price of zero).

use alloy_primitives::{Bytes, U256};
use tracing::debug;

use crate::address::Address;
use crate::error::Result;
use crate::rpc::{RpcClient, RpcTransport};
use crate::transaction::UnsignedTransaction;

/// Default `maxPriorityFeePerGas`: the smallest positive tip, 1 wei.
pub const DEFAULT_PRIORITY_FEE_FLOOR: U256 = U256::from_limbs([1, 0, 0, 0]);

/// Builds [`UnsignedTransaction`]s by querying a node.
#[derive(Debug)]
pub struct TransactionBuilder<'a, T> {
    rpc: &'a RpcClient<T>,
    priority_fee_floor: U256,
}

impl<'a, T: RpcTransport> TransactionBuilder<'a, T> {
    /// Creates a builder with the default priority fee floor.
    pub const fn new(rpc: &'a RpcClient<T>) -> Self {
        Self {
            rpc,
            priority_fee_floor: DEFAULT_PRIORITY_FEE_FLOOR,
        }
    }

    /// Overrides the `maxPriorityFeePerGas` floor.
    #[must_use]
    pub const fn with_priority_fee_floor(mut self, floor: U256) -> Self {
        self.priority_fee_floor = floor;
        self
    }

    /// Assembles a zero-value call from `sender` to `recipient` carrying
    /// `payload`.
    ///
    /// Issues four sequential RPC calls: `eth_chainId`, `eth_estimateGas`,
    /// `eth_getTransactionCount` and `eth_gasPrice`.
    ///
    /// # Errors
    ///
    /// - [`Error::RpcUnavailable`](crate::Error::RpcUnavailable) as soon as
    ///   any call fails or returns an unparseable result
    /// - [`Error::InvalidTransaction`](crate::Error::InvalidTransaction) if
    ///   the node's gas estimate is below the intrinsic cost
    pub async fn build(
        &self,
        recipient: Address,
        sender: Address,
        payload: Bytes,
    ) -> Result<UnsignedTransaction> {
        let value = U256::ZERO;

        let chain_id = self.rpc.chain_id().await?;
        let gas_limit = self
            .rpc
            .estimate_gas(sender, recipient, value, &payload)
            .await?;
        let nonce = self.rpc.transaction_count(sender).await?;
        let gas_price = self.rpc.gas_price().await?;

        let max_fee_per_gas = gas_price.max(self.priority_fee_floor);
        if max_fee_per_gas != gas_price {
            debug!(%gas_price, %max_fee_per_gas, "gas price below priority fee floor, raising fee cap");
        }

        debug!(chain_id, gas_limit, nonce, %gas_price, "assembled unsigned transaction");

        let tx = UnsignedTransaction {
            chain_id,
            nonce,
            max_priority_fee_per_gas: self.priority_fee_floor,
            max_fee_per_gas,
            gas_limit,
            to: Some(recipient),
            value,
            data: payload,
            access_list: vec![],
        };
        tx.validate()?;

        Ok(tx)
    }
}
