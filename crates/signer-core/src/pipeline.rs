//! End-to-end signing: build → sign → resolve → broadcast.
//!
//! Each stage consumes exactly the previous stage's output and the first
//! failure aborts the rest, so nothing partial ever reaches the node. The
//! wallet curve is checked before the first RPC call.
//!
//! The pipeline holds no lock. Callers must not run two requests for the same
//! wallet at once, or both may pick up the same nonce.
//!
//! # Example
//!
//! ```ignore
//! use card_evm_signer_core::{SignerConfig, SigningPipeline};
//!
//! let config = SignerConfig::from_file("signer.json")?;
//! let pipeline = SigningPipeline::from_config(&config, config.http_transport()?, card_signer);
//! let tx_id = pipeline.send(&wallet_key, recipient, calldata).await?;
//! ```

use alloy_primitives::{B256, Bytes, U256};
use tracing::info;

use crate::address::{Address, PublicKey, derive_address};
use crate::broadcast::Broadcaster;
use crate::builder::{DEFAULT_PRIORITY_FEE_FLOOR, TransactionBuilder};
use crate::config::SignerConfig;
use crate::error::Result;
use crate::resolver::RecoveryResolver;
use crate::rpc::{RpcClient, RpcTransport};
use crate::signer::HashSigner;
use crate::transaction::SignedTransaction;

/// Wires the node, the card and the resolver together.
#[derive(Debug)]
pub struct SigningPipeline<T, S> {
    rpc: RpcClient<T>,
    signer: S,
    resolver: RecoveryResolver,
    priority_fee_floor: U256,
}

impl<T: RpcTransport, S: HashSigner> SigningPipeline<T, S> {
    /// Creates a pipeline with the default priority fee floor.
    pub const fn new(transport: T, signer: S) -> Self {
        Self {
            rpc: RpcClient::new(transport),
            signer,
            resolver: RecoveryResolver::new(),
            priority_fee_floor: DEFAULT_PRIORITY_FEE_FLOOR,
        }
    }

    /// Creates a pipeline using the fee policy of `config`.
    pub fn from_config(config: &SignerConfig, transport: T, signer: S) -> Self {
        Self {
            priority_fee_floor: config.priority_fee_floor,
            ..Self::new(transport, signer)
        }
    }

    /// Returns the RPC client.
    pub const fn rpc(&self) -> &RpcClient<T> {
        &self.rpc
    }

    /// Returns the hash signer.
    pub const fn signer(&self) -> &S {
        &self.signer
    }

    /// Builds, signs and resolves a zero-value call to `recipient`, without
    /// broadcasting it.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedCurve`](crate::Error::UnsupportedCurve) before any
    ///   network call if `wallet` is not secp256k1
    /// - [`Error::RpcUnavailable`](crate::Error::RpcUnavailable) if the build
    ///   queries fail; the card is not asked to sign
    /// - [`Error::SigningFailed`](crate::Error::SigningFailed) from the card
    /// - the errors of [`RecoveryResolver::resolve`]
    pub async fn sign(
        &self,
        wallet: &PublicKey,
        recipient: Address,
        payload: Bytes,
    ) -> Result<SignedTransaction> {
        let sender = derive_address(wallet)?;
        info!(%sender, %recipient, "signing transaction");

        let unsigned = TransactionBuilder::new(&self.rpc)
            .with_priority_fee_floor(self.priority_fee_floor)
            .build(recipient, sender, payload)
            .await?;

        let hash = unsigned.signing_hash();
        let raw_signature = self.signer.sign(hash, wallet).await?;

        self.resolver.resolve(&unsigned, raw_signature, sender)
    }

    /// Like [`Self::sign`], then broadcasts and returns the transaction id.
    ///
    /// # Errors
    ///
    /// Everything [`Self::sign`] returns, plus the errors of
    /// [`Broadcaster::broadcast`].
    pub async fn send(&self, wallet: &PublicKey, recipient: Address, payload: Bytes) -> Result<B256> {
        let signed = self.sign(wallet, recipient, payload).await?;
        Broadcaster::new(&self.rpc).broadcast(signed).await
    }
}
