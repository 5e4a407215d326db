//! Submission of signed transactions to the network.
//!
//! A broadcast is a single `eth_sendRawTransaction` call. Rejections are
//! reported as-is; resubmitting (for example with a fresh nonce) is up to the
//! caller.

use alloy_primitives::B256;
use tracing::{info, warn};

use crate::error::Result;
use crate::rpc::{RpcClient, RpcTransport};
use crate::transaction::SignedTransaction;

/// Serializes and submits [`SignedTransaction`]s.
#[derive(Debug)]
pub struct Broadcaster<'a, T> {
    rpc: &'a RpcClient<T>,
}

impl<'a, T: RpcTransport> Broadcaster<'a, T> {
    /// Creates a broadcaster over `rpc`.
    pub const fn new(rpc: &'a RpcClient<T>) -> Self {
        Self { rpc }
    }

    /// Submits `signed_tx` and returns the transaction id reported by the node.
    ///
    /// Takes ownership: a transaction is broadcast at most once.
    ///
    /// # Errors
    ///
    /// - [`Error::BroadcastRejected`](crate::Error::BroadcastRejected) with
    ///   the node's reason when it refuses the transaction
    /// - [`Error::RpcUnavailable`](crate::Error::RpcUnavailable) on transport
    ///   failure
    pub async fn broadcast(&self, signed_tx: SignedTransaction) -> Result<B256> {
        let local_hash = signed_tx.tx_hash();
        let tx_id = self.rpc.send_raw_transaction(&signed_tx.encoded()).await?;

        if tx_id != local_hash {
            warn!(%tx_id, %local_hash, "node reported a different transaction hash");
        }
        info!(%tx_id, nonce = signed_tx.tx().nonce, "transaction broadcast");

        Ok(tx_id)
    }
}
