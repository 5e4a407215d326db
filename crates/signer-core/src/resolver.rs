//! Recovery-id resolution for signatures from hash-only devices.
//!
//! A card returns `(r, s)` without telling which of the two curve points with
//! x-coordinate `r` it used. [`RecoveryResolver::resolve`] tries both parities
//! in ascending order, recovers the signer for each, and keeps the first one
//! whose address equals the expected sender:
//!
//! ```text
//! (tx, r, s) ──► normalize s ──► parity 0 ──► recover ──► == sender? ──► yes ─┐
//!                                   │                          no             │
//!                                   ▼                                         │
//!                                parity 1 ──► recover ──► == sender? ──► yes ─┤
//!                                                              no             ▼
//!                                                  SignatureAddressMismatch  verify ──► SignedTransaction
//! ```
//!
//! The chosen transaction is then re-encoded, decoded and recovered again as a
//! self-check. A failure there is [`Error::InternalVerificationFailed`] and
//! indicates a bug, not a bad card.
//!
//! For EIP-1559 the recovery id is the bare y-parity; the EIP-155 chain-id
//! offset does not apply to typed transactions, neither during recovery nor
//! when encoding.

use tracing::{debug, info};

use crate::address::Address;
use crate::crypto;
use crate::error::{Error, Result};
use crate::signature::RawSignature;
use crate::transaction::{SignedTransaction, UnsignedTransaction};

/// The y-parities a signature can have, in the order they are tried.
pub const RECOVERY_CANDIDATES: [bool; 2] = [false, true];

/// Resolves the missing recovery id of a [`RawSignature`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryResolver;

impl RecoveryResolver {
    /// Creates a resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Attaches the recovery id under which `raw_signature` recovers
    /// `expected_sender`, and verifies the result.
    ///
    /// # Errors
    ///
    /// - [`Error::SignatureAddressMismatch`] if neither candidate recovers
    ///   `expected_sender`, including when `r` or `s` is zero or out of range
    /// - [`Error::InternalVerificationFailed`] if the selected transaction
    ///   fails its own field or signature checks
    pub fn resolve(
        &self,
        unsigned_tx: &UnsignedTransaction,
        raw_signature: RawSignature,
        expected_sender: Address,
    ) -> Result<SignedTransaction> {
        let mismatch = Error::SignatureAddressMismatch {
            expected: expected_sender,
        };

        let (raw_signature, flipped) = match crypto::normalize_s(raw_signature) {
            Ok(normalized) => normalized,
            Err(e) => {
                debug!(error = %e, "card signature is not a valid scalar pair");
                return Err(mismatch);
            }
        };
        if flipped {
            debug!("card returned high-s signature, normalized");
        }

        let hash = unsigned_tx.signing_hash();

        for y_parity in RECOVERY_CANDIDATES {
            let candidate = raw_signature.with_parity(y_parity);

            match crypto::recover_address(&hash, &candidate) {
                Ok(recovered) if recovered == expected_sender => {
                    info!(recovery_id = candidate.recovery_id(), %recovered, "resolved recovery id");
                    let signed = SignedTransaction::new(unsigned_tx.clone(), candidate);
                    verify(&signed, expected_sender)?;
                    return Ok(signed);
                }
                Ok(recovered) => {
                    debug!(recovery_id = candidate.recovery_id(), %recovered, "candidate recovers another address");
                }
                Err(e) => {
                    debug!(recovery_id = candidate.recovery_id(), error = %e, "candidate does not recover");
                }
            }
        }

        Err(mismatch)
    }
}

/// Checks that `signed` is a transaction a node would accept, survives a wire
/// round trip and still recovers `expected_sender`.
fn verify(signed: &SignedTransaction, expected_sender: Address) -> Result<()> {
    signed
        .tx()
        .validate()
        .map_err(|e| Error::InternalVerificationFailed(e.to_string()))?;

    let decoded = SignedTransaction::decode(&signed.encoded())
        .map_err(|e| Error::InternalVerificationFailed(format!("re-decoding failed: {e}")))?;
    if &decoded != signed {
        return Err(Error::InternalVerificationFailed(
            "decoded transaction differs from the encoded one".to_string(),
        ));
    }

    if !decoded.verify_signature(expected_sender) {
        return Err(Error::InternalVerificationFailed(format!(
            "decoded transaction does not recover {expected_sender}"
        )));
    }

    Ok(())
}
