//! Signature types for hash-only signing devices.
//!
//! A card signs a 32-byte digest and returns only `r || s` as 128 hex
//! characters. That pair is a [`RawSignature`]: valid for *some* recovery id,
//! but which one is unknown. Attaching the y-parity found by the
//! [`resolver`](crate::resolver) yields a full [`Signature`].
//!
//! # Example
//!
//! ```
//! use card_evm_signer_core::signature::RawSignature;
//!
//! let card_output = format!("{}{}", "11".repeat(32), "22".repeat(32));
//! let raw = RawSignature::from_hex(&card_output).unwrap();
//!
//! let full = raw.with_parity(true);
//! assert!(full.y_parity());
//! assert_eq!(full.raw(), raw);
//! ```

use core::fmt;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An ECDSA `(r, s)` pair without a recovery id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawSignature {
    r: U256,
    s: U256,
}

impl RawSignature {
    /// The length of `r || s` in bytes.
    pub const BYTE_LEN: usize = 64;

    /// The length of `r || s` as the card reports it, in hex characters.
    pub const HEX_LEN: usize = Self::BYTE_LEN * 2;

    /// Creates a raw signature from its two scalars.
    #[must_use]
    pub const fn new(r: U256, s: U256) -> Self {
        Self { r, s }
    }

    /// Creates a raw signature from a 64-byte big-endian `r || s` slice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`] if the slice is not 64 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::BYTE_LEN {
            return Err(Error::InvalidSignature(format!(
                "expected {} bytes, got {}",
                Self::BYTE_LEN,
                bytes.len()
            )));
        }

        Ok(Self::new(
            U256::from_be_slice(&bytes[..32]),
            U256::from_be_slice(&bytes[32..]),
        ))
    }

    /// Parses the card's 128-hex-character `r || s` output.
    ///
    /// A `0x` prefix is tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`] on a wrong length and
    /// [`Error::HexDecodeFailed`] on non-hex input.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        if hex_str.len() != Self::HEX_LEN {
            return Err(Error::InvalidSignature(format!(
                "expected {} hex characters, got {}",
                Self::HEX_LEN,
                hex_str.len()
            )));
        }
        Self::from_bytes(&hex::decode(hex_str)?)
    }

    /// Serializes to 64 bytes, `r || s`, big-endian.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::BYTE_LEN] {
        let mut bytes = [0u8; Self::BYTE_LEN];
        bytes[..32].copy_from_slice(&self.r.to_be_bytes::<32>());
        bytes[32..].copy_from_slice(&self.s.to_be_bytes::<32>());
        bytes
    }

    /// Returns the R component.
    #[must_use]
    pub const fn r(&self) -> U256 {
        self.r
    }

    /// Returns the S component.
    #[must_use]
    pub const fn s(&self) -> U256 {
        self.s
    }

    /// Attaches a y-parity, producing a full [`Signature`].
    #[must_use]
    pub const fn with_parity(self, y_parity: bool) -> Signature {
        Signature {
            r: self.r,
            s: self.s,
            y_parity,
        }
    }
}

impl fmt::Display for RawSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_bytes()))
    }
}

/// An ECDSA signature with its recovery id.
///
/// For EIP-1559 transactions the recovery id is the bare y-parity of the
/// ephemeral point; no chain-id offset is ever applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    r: U256,
    s: U256,
    y_parity: bool,
}

impl Signature {
    /// The length of a serialized `r || s || v` signature in bytes.
    pub const BYTE_LEN: usize = 65;

    /// Creates a signature from its components.
    #[must_use]
    pub const fn new(r: U256, s: U256, y_parity: bool) -> Self {
        Self { r, s, y_parity }
    }

    /// Returns the R component.
    #[must_use]
    pub const fn r(&self) -> U256 {
        self.r
    }

    /// Returns the S component.
    #[must_use]
    pub const fn s(&self) -> U256 {
        self.s
    }

    /// Returns the y-parity of the signature.
    #[must_use]
    pub const fn y_parity(&self) -> bool {
        self.y_parity
    }

    /// Returns the recovery id as `0` or `1`.
    #[must_use]
    pub const fn recovery_id(&self) -> u8 {
        self.y_parity as u8
    }

    /// Drops the recovery id.
    #[must_use]
    pub const fn raw(&self) -> RawSignature {
        RawSignature::new(self.r, self.s)
    }

    /// Serializes to 65 bytes, `r || s || v` with `v` in `{0, 1}`.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::BYTE_LEN] {
        let mut bytes = [0u8; Self::BYTE_LEN];
        bytes[..64].copy_from_slice(&self.raw().to_bytes());
        bytes[64] = self.recovery_id();
        bytes
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_bytes()))
    }
}
