//! Ethereum address derivation from secp256k1 card wallets.
//!
//! A card session hands out wallets as a hex public key plus a curve
//! identifier (see [`WalletDescriptor`]). Only [`Curve::Secp256k1`] wallets can
//! sign Ethereum transactions; every other curve is rejected with
//! [`Error::UnsupportedCurve`] before anything touches the network.
//!
//! The derivation itself is the standard Ethereum transform:
//!
//! 1. Decompress the public key to an uncompressed SEC1 point (`0x04 || x || y`)
//! 2. Drop the `0x04` prefix
//! 3. Keccak-256 the remaining 64 bytes
//! 4. Keep the last 20 bytes
//!
//! # Example
//!
//! ```
//! use card_evm_signer_core::address::{Curve, PublicKey, derive_address};
//!
//! // secp256k1 generator point, compressed
//! let key = PublicKey::from_hex(
//!     "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
//!     Curve::Secp256k1,
//! )
//! .unwrap();
//! let address = derive_address(&key).unwrap();
//! assert_eq!(
//!     address.to_checksum_hex(),
//!     "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
//! );
//! ```

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address as AlloyAddress, keccak256};
use k256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An Ethereum address (20 bytes).
///
/// Wraps [`alloy_primitives::Address`]; once derived it never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(AlloyAddress);

impl Address {
    /// The length of an Ethereum address in bytes.
    pub const BYTE_LEN: usize = 20;

    /// Creates a new address from a 20-byte array.
    #[must_use]
    pub const fn new(bytes: [u8; Self::BYTE_LEN]) -> Self {
        Self(AlloyAddress::new(bytes))
    }

    /// Returns the zero address (`0x0000...0000`).
    #[must_use]
    pub const fn zero() -> Self {
        Self(AlloyAddress::ZERO)
    }

    /// Checks if this is the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Derives the address controlled by a secp256k1 verifying key.
    #[must_use]
    pub fn from_public_key(public_key: &VerifyingKey) -> Self {
        let encoded = public_key.to_encoded_point(false);
        let hash = keccak256(&encoded.as_bytes()[1..]);

        let mut address_bytes = [0u8; Self::BYTE_LEN];
        address_bytes.copy_from_slice(&hash[12..]);
        Self::new(address_bytes)
    }

    /// Returns the [`Address`] as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; Self::BYTE_LEN] {
        self.0.as_ref()
    }

    /// Returns the [`Address`] as an EIP-55 checksummed hex string.
    #[must_use]
    pub fn to_checksum_hex(&self) -> String {
        self.0.to_checksum(None)
    }

    /// Returns the [`Address`] as a lowercase hex string with `0x` prefix.
    ///
    /// This is the form sent to JSON-RPC nodes.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.as_bytes()))
    }

    /// Parses an [`Address`] from a hex string, optionally prefixed with `0x`.
    ///
    /// Checksums are not enforced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HexDecodeFailed`] if the hex string is invalid, or
    /// [`Error::InvalidAddress`] if the decoded bytes are not 20 bytes.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let bytes = hex::decode(hex_str)?;

        let bytes: [u8; Self::BYTE_LEN] = bytes.as_slice().try_into().map_err(|_| {
            Error::InvalidAddress(format!(
                "expected {} bytes, got {}",
                Self::BYTE_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self::new(bytes))
    }

    /// Returns the inner [`alloy_primitives::Address`].
    #[must_use]
    pub const fn inner(&self) -> AlloyAddress {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_checksum_hex())
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl From<AlloyAddress> for Address {
    fn from(addr: AlloyAddress) -> Self {
        Self(addr)
    }
}

impl From<Address> for AlloyAddress {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self::new(bytes)
    }
}

/// The elliptic curve a card wallet was created on.
///
/// Cards can hold wallets on several curves; only [`Curve::Secp256k1`] is
/// usable for Ethereum transactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Curve {
    /// secp256k1, the Ethereum curve.
    Secp256k1,
    /// NIST P-256.
    Secp256r1,
    /// Edwards25519.
    Ed25519,
    /// Any curve identifier this crate does not know about.
    Other(String),
}

impl Curve {
    /// Returns the identifier string the card session uses for this curve.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Secp256k1 => "secp256k1",
            Self::Secp256r1 => "secp256r1",
            Self::Ed25519 => "ed25519",
            Self::Other(name) => name,
        }
    }

    /// Parses a curve identifier, case-insensitively.
    #[must_use]
    pub fn from_identifier(identifier: &str) -> Self {
        match identifier.to_ascii_lowercase().as_str() {
            "secp256k1" => Self::Secp256k1,
            "secp256r1" | "p256" => Self::Secp256r1,
            "ed25519" => Self::Ed25519,
            _ => Self::Other(identifier.to_string()),
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A wallet public key as reported by the card, tagged with its curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    bytes: Vec<u8>,
    curve: Curve,
}

impl PublicKey {
    /// Creates a public key from raw bytes and a curve.
    ///
    /// The bytes are not validated until the key is used.
    #[must_use]
    pub const fn new(bytes: Vec<u8>, curve: Curve) -> Self {
        Self { bytes, curve }
    }

    /// Parses a hex public key, optionally prefixed with `0x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HexDecodeFailed`] if the hex string is invalid.
    pub fn from_hex(hex_str: &str, curve: Curve) -> Result<Self> {
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        Ok(Self::new(hex::decode(hex_str)?, curve))
    }

    /// Returns the raw key bytes as reported by the card.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the curve of this key.
    #[must_use]
    pub const fn curve(&self) -> &Curve {
        &self.curve
    }

    /// Fails with [`Error::UnsupportedCurve`] unless the key is secp256k1.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn ensure_supported(&self) -> Result<()> {
        if self.curve == Curve::Secp256k1 {
            Ok(())
        } else {
            Err(Error::UnsupportedCurve(self.curve.to_string()))
        }
    }

    /// Parses the key into a secp256k1 verifying key.
    ///
    /// Accepts 33-byte compressed, 65-byte uncompressed, or 64-byte raw
    /// `x || y` encodings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCurve`] for non-secp256k1 keys and
    /// [`Error::InvalidPublicKey`] if the bytes are not a point on the curve.
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        self.ensure_supported()?;

        let parsed = match self.bytes.len() {
            64 => {
                let mut sec1 = [0u8; 65];
                sec1[0] = 0x04;
                sec1[1..].copy_from_slice(&self.bytes);
                VerifyingKey::from_sec1_bytes(&sec1)
            }
            33 | 65 => VerifyingKey::from_sec1_bytes(&self.bytes),
            len => {
                return Err(Error::InvalidPublicKey(format!(
                    "expected 33, 64 or 65 bytes, got {len}"
                )));
            }
        };

        parsed.map_err(|e| Error::InvalidPublicKey(e.to_string()))
    }
}

/// A wallet as described by the card session.
///
/// ```
/// use card_evm_signer_core::address::WalletDescriptor;
///
/// let wallet: WalletDescriptor = serde_json::from_str(
///     r#"{"publicKey": "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
///         "curve": "secp256k1"}"#,
/// )
/// .unwrap();
/// assert!(wallet.public_key().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDescriptor {
    /// Hex-encoded public key.
    pub public_key: String,

    /// Curve identifier, e.g. `"secp256k1"`.
    pub curve: String,
}

impl WalletDescriptor {
    /// Parses the descriptor into a [`PublicKey`].
    ///
    /// The curve is not checked here; [`derive_address`] does that.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HexDecodeFailed`] if the public key is not hex.
    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_hex(&self.public_key, Curve::from_identifier(&self.curve))
    }
}

/// Derives the Ethereum address of a card wallet.
///
/// Pure and deterministic: the same key always yields the same address.
///
/// # Errors
///
/// Returns [`Error::UnsupportedCurve`] if the key is not secp256k1, or
/// [`Error::InvalidPublicKey`] if it is not a valid point.
pub fn derive_address(public_key: &PublicKey) -> Result<Address> {
    let verifying_key = public_key.verifying_key()?;
    Ok(Address::from_public_key(&verifying_key))
}
