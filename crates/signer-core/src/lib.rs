//! Card EVM Signer Core Library
//!
//! This crate signs Ethereum EIP-1559 transactions with hardware cards that
//! expose a hash-only signing primitive: the card signs a 32-byte digest and
//! returns `(r, s)`, but not the recovery id Ethereum needs to identify the
//! signer.
//!
//! # Overview
//!
//! The signing flow runs in four stages, each consuming the output of the
//! previous one:
//!
//! - **Build**: query the node for chain id, gas estimate, nonce and gas price
//!   and assemble an [`UnsignedTransaction`]
//! - **Sign**: hand the transaction's signing hash to a [`HashSigner`]
//! - **Resolve**: find the y-parity under which the signature recovers the
//!   wallet address, then re-verify the result ([`RecoveryResolver`])
//! - **Broadcast**: submit the serialized transaction with
//!   `eth_sendRawTransaction` ([`Broadcaster`])
//!
//! [`SigningPipeline`] wires the four together.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SigningPipeline                           │
//! ├──────────────┬──────────────┬──────────────┬────────────────┤
//! │ Transaction  │  HashSigner  │   Recovery   │  Broadcaster   │
//! │   Builder    │  (card API)  │   Resolver   │                │
//! ├──────────────┴──────────────┼──────────────┴────────────────┤
//! │  Address  │  Transaction    │  Crypto (k256 recovery)       │
//! │ Derivation│  Encoding (RLP) │  Signature types              │
//! ├─────────────────────────────┴───────────────────────────────┤
//! │           RpcClient over an RpcTransport (HTTP / mock)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## Deriving the Sender Address
//!
//! ```rust
//! use card_evm_signer_core::WalletDescriptor;
//!
//! let wallet: WalletDescriptor = serde_json::from_str(
//!     r#"{
//!         "publicKey": "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
//!         "curve": "secp256k1"
//!     }"#,
//! )
//! .unwrap();
//!
//! let key = wallet.public_key().unwrap();
//! let sender = card_evm_signer_core::address::derive_address(&key).unwrap();
//! println!("Sender: {sender}");
//! ```
//!
//! ## Resolving a Card Signature
//!
//! ```ignore
//! use card_evm_signer_core::{RawSignature, RecoveryResolver};
//!
//! let raw = RawSignature::from_hex(&card_output)?;
//! let signed = RecoveryResolver::new().resolve(&unsigned, raw, sender)?;
//! let wire_bytes = signed.encoded();
//! ```
//!
//! ## Sending a Transaction
//!
//! ```ignore
//! use card_evm_signer_core::{CardHashSigner, SignerConfig, SigningPipeline};
//!
//! let config = SignerConfig::from_file("signer.json")?;
//! let pipeline = SigningPipeline::from_config(
//!     &config,
//!     config.http_transport()?,
//!     CardHashSigner::new(session),
//! );
//! let tx_id = pipeline.send(&wallet_key, recipient, calldata).await?;
//! ```
//!
//! # Feature Flags
//!
//! - `http` (default): enables [`rpc::HttpTransport`], a JSON-RPC transport
//!   over `reqwest`. Without it, callers supply their own [`RpcTransport`].
//!
//! # Security Considerations
//!
//! - Private keys never leave the card
//! - Card signatures are normalized to low-S form before recovery
//! - A resolved transaction is decoded and recovered again before it is
//!   returned; nothing that fails that check is broadcast
//! - The pipeline does not serialize nonce use; run one request per wallet at
//!   a time

// Dev-dependency used only by the integration tests and the example
#[cfg(test)]
use tracing_subscriber as _;

// Modules
pub mod address;
pub mod broadcast;
pub mod builder;
pub mod config;
pub mod crypto;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod rpc;
pub mod signature;
pub mod signer;
pub mod transaction;

// Re-exports for convenience
pub use address::{Address, Curve, PublicKey, WalletDescriptor};
pub use broadcast::Broadcaster;
pub use builder::TransactionBuilder;
pub use config::SignerConfig;
pub use error::{Error, ErrorCategory, Result};
pub use pipeline::SigningPipeline;
pub use resolver::RecoveryResolver;
pub use rpc::{RpcClient, RpcTransport};
pub use signature::{RawSignature, Signature};
pub use signer::{CardHashSigner, CardSession, HashSigner};
pub use transaction::{AccessListEntry, SignedTransaction, UnsignedTransaction};

// Re-export commonly used alloy types
pub use alloy_primitives::{B256, Bytes, U256};
