//! Error types for the card EVM signer library.
//!
//! This module provides the [`enum@Error`] type covering every failure mode of
//! the signing flow, from wallet inspection to broadcast.
//!
//! # Error Categories
//!
//! - **Wallet errors**: unsupported curves and malformed public keys
//! - **Network errors**: JSON-RPC transport or parse failures
//! - **Device errors**: the card declined or returned garbage
//! - **Trust errors**: the signature does not belong to the expected sender
//! - **Broadcast errors**: the node refused the serialized transaction
//!
//! Use [`Error::category`] to branch on the broad class of a failure.
//!
//! # Example
//!
//! ```
//! use card_evm_signer_core::{Error, ErrorCategory};
//!
//! let err = Error::UnsupportedCurve("ed25519".to_string());
//! assert_eq!(err.category(), ErrorCategory::Wallet);
//! ```

use alloy_rlp::Error as AlloyRlpError;
use core::result::Result as CoreResult;
use hex::FromHexError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::address::Address;

/// The main error type for the card EVM signer library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Wallet Errors
    // =========================================================================
    /// The wallet key lives on a curve this flow cannot sign with.
    #[error("unsupported curve: {0}")]
    UnsupportedCurve(String),

    /// The public key is invalid or malformed.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// An address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    // =========================================================================
    // Network Errors
    // =========================================================================
    /// A JSON-RPC call failed at the transport level, returned an error
    /// object, or returned a result that could not be parsed.
    #[error("RPC {method} unavailable: {reason}")]
    RpcUnavailable {
        /// The JSON-RPC method that failed.
        method: String,
        /// What went wrong.
        reason: String,
    },

    // =========================================================================
    // Device Errors
    // =========================================================================
    /// The signing device declined the request or failed.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// The signature is invalid or malformed.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    // =========================================================================
    // Trust Errors
    // =========================================================================
    /// Neither recovery candidate recovers the expected sender.
    #[error("signature does not recover to expected sender {expected}")]
    SignatureAddressMismatch {
        /// The address the signature was supposed to come from.
        expected: Address,
    },

    /// The resolved transaction failed its own signature check.
    #[error("internal verification failed: {0}")]
    InternalVerificationFailed(String),

    // =========================================================================
    // Broadcast Errors
    // =========================================================================
    /// The node refused the serialized transaction.
    #[error("transaction rejected by node: {reason}")]
    BroadcastRejected {
        /// The node's reason, verbatim.
        reason: String,
    },

    // =========================================================================
    // Transaction Errors
    // =========================================================================
    /// The transaction fields break an EIP-1559 rule a node would enforce.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    // =========================================================================
    // Serialization and Configuration Errors
    // =========================================================================
    /// Failed to parse hex data.
    #[error("hex decoding failed: {0}")]
    HexDecodeFailed(String),

    /// Failed to decode RLP bytes.
    #[error("RLP decoding failed: {0}")]
    RlpDecodingFailed(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// The configuration is invalid or could not be read.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Broad classes of [`enum@Error`], for callers that need to tell a device
/// problem from a network problem from a signature that must not be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The wallet cannot be used for this flow.
    Wallet,
    /// The node could not be reached or answered nonsense.
    Network,
    /// The signing device failed.
    Device,
    /// The signature does not belong to the expected sender. Do not broadcast.
    Untrusted,
    /// An internal invariant broke. Do not broadcast.
    Defect,
    /// The node refused the transaction.
    Rejected,
    /// Caller-supplied input or configuration was malformed.
    Input,
}

impl Error {
    /// Returns the broad [`ErrorCategory`] of this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedCurve(_) | Self::InvalidPublicKey(_) => ErrorCategory::Wallet,
            Self::RpcUnavailable { .. } => ErrorCategory::Network,
            Self::SigningFailed(_) | Self::InvalidSignature(_) => ErrorCategory::Device,
            Self::SignatureAddressMismatch { .. } => ErrorCategory::Untrusted,
            Self::InternalVerificationFailed(_) => ErrorCategory::Defect,
            Self::BroadcastRejected { .. } => ErrorCategory::Rejected,
            Self::InvalidAddress(_)
            | Self::InvalidTransaction(_)
            | Self::HexDecodeFailed(_)
            | Self::RlpDecodingFailed(_)
            | Self::JsonError(_)
            | Self::InvalidConfig(_) => ErrorCategory::Input,
        }
    }

    /// Shorthand for building an [`Error::RpcUnavailable`].
    pub(crate) fn rpc(method: &str, reason: impl Into<String>) -> Self {
        Self::RpcUnavailable {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<FromHexError> for Error {
    fn from(err: FromHexError) -> Self {
        Error::HexDecodeFailed(err.to_string())
    }
}

impl From<SerdeJsonError> for Error {
    fn from(err: SerdeJsonError) -> Self {
        Error::JsonError(err.to_string())
    }
}

impl From<AlloyRlpError> for Error {
    fn from(err: AlloyRlpError) -> Self {
        Error::RlpDecodingFailed(err.to_string())
    }
}

/// A specialized [`Result`] type for card EVM signer operations.
pub type Result<T> = CoreResult<T, Error>;
