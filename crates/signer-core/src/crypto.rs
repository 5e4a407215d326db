//! secp256k1 helpers: low-S normalization and public-key recovery.
//!
//! Cards are free to return either of the two equivalent `s` values for a
//! signature. Ethereum nodes only accept the lower one (EIP-2), and the
//! recovery primitive rejects the upper one, so [`normalize_s`] runs before
//! any recovery attempt.
//!
//! # Example
//!
//! ```
//! use alloy_primitives::U256;
//! use card_evm_signer_core::crypto::normalize_s;
//! use card_evm_signer_core::signature::RawSignature;
//!
//! let raw = RawSignature::new(U256::from(1), U256::from(2));
//! let (normalized, flipped) = normalize_s(raw).unwrap();
//! assert_eq!(normalized, raw);
//! assert!(!flipped);
//! ```

use alloy_primitives::B256;
use k256::ecdsa::{RecoveryId, Signature as K256Signature, VerifyingKey};

use crate::address::Address;
use crate::error::{Error, Result};
use crate::signature::{RawSignature, Signature};

/// Converts a raw pair into a `k256` signature, range-checking both scalars.
fn to_k256(raw: &RawSignature) -> Result<K256Signature> {
    K256Signature::from_slice(&raw.to_bytes())
        .map_err(|_| Error::InvalidSignature("r or s out of range".to_string()))
}

/// Normalizes a signature to low-S form.
///
/// Returns the normalized pair and whether `s` was negated. Negating `s`
/// flips the y-parity, which is fine here because the recovery id is found
/// by trial afterwards.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if `r` or `s` is zero or not below the
/// curve order.
pub fn normalize_s(raw: RawSignature) -> Result<(RawSignature, bool)> {
    let signature = to_k256(&raw)?;

    match signature.normalize_s() {
        Some(normalized) => Ok((RawSignature::from_bytes(&normalized.to_bytes())?, true)),
        None => Ok((raw, false)),
    }
}

/// Recovers the public key that produced `signature` over `hash`.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if the scalars are out of range, or if
/// no point on the curve matches `r` for the given parity.
pub fn recover_public_key(hash: &B256, signature: &Signature) -> Result<VerifyingKey> {
    let k256_signature = to_k256(&signature.raw())?;
    let recovery_id = RecoveryId::new(signature.y_parity(), false);

    VerifyingKey::recover_from_prehash(hash.as_slice(), &k256_signature, recovery_id)
        .map_err(|e| Error::InvalidSignature(format!("recovery failed: {e}")))
}

/// Recovers the address that produced `signature` over `hash`.
///
/// # Errors
///
/// See [`recover_public_key`].
pub fn recover_address(hash: &B256, signature: &Signature) -> Result<Address> {
    recover_public_key(hash, signature).map(|key| Address::from_public_key(&key))
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{U256, keccak256};
    use k256::ecdsa::SigningKey;

    use super::*;

    /// Order of the secp256k1 group.
    const N: U256 = U256::from_be_bytes([
        0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        0xFE, 0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36,
        0x41, 0x41,
    ]);

    fn sign(key: &SigningKey, hash: &B256) -> Signature {
        let (sig, recid) = key.sign_prehash_recoverable(hash.as_slice()).unwrap();
        let raw = RawSignature::from_bytes(&sig.to_bytes()).unwrap();
        raw.with_parity(recid.is_y_odd())
    }

    fn test_key() -> SigningKey {
        SigningKey::from_slice(&[0x42; 32]).unwrap()
    }

    #[test]
    fn recover_matches_signer() {
        let key = test_key();
        let hash = keccak256(b"recover-matches-signer");
        let signature = sign(&key, &hash);

        let recovered = recover_address(&hash, &signature).unwrap();
        assert_eq!(recovered, Address::from_public_key(key.verifying_key()));
    }

    #[test]
    fn wrong_parity_recovers_someone_else() {
        let key = test_key();
        let hash = keccak256(b"wrong-parity");
        let signature = sign(&key, &hash);
        let flipped = signature.raw().with_parity(!signature.y_parity());

        // The flipped parity may not correspond to a point at all; if it
        // does, it must not be the signer.
        if let Ok(other) = recover_address(&hash, &flipped) {
            assert_ne!(other, Address::from_public_key(key.verifying_key()));
        }
    }

    #[test]
    fn normalize_s_flips_high_s() {
        let key = test_key();
        let hash = keccak256(b"normalize-high-s");
        let low = sign(&key, &hash).raw();
        let high = RawSignature::new(low.r(), N - low.s());

        let (normalized, flipped) = normalize_s(high).unwrap();
        assert!(flipped);
        assert_eq!(normalized, low);

        let (unchanged, flipped) = normalize_s(low).unwrap();
        assert!(!flipped);
        assert_eq!(unchanged, low);
    }

    #[test]
    fn zero_scalars_are_invalid() {
        let raw = RawSignature::new(U256::ZERO, U256::from(1));
        assert!(matches!(normalize_s(raw), Err(Error::InvalidSignature(_))));

        let hash = B256::ZERO;
        let result = recover_public_key(&hash, &raw.with_parity(false));
        assert!(matches!(result, Err(Error::InvalidSignature(_))));
    }

    #[test]
    fn out_of_range_scalars_are_invalid() {
        let raw = RawSignature::new(U256::MAX, U256::MAX);
        assert!(matches!(normalize_s(raw), Err(Error::InvalidSignature(_))));
    }
}
