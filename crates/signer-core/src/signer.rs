//! The hash-only signing device.
//!
//! [`HashSigner`] is the only thing the signing flow needs from hardware: sign
//! one 32-byte digest with a given wallet and hand back `(r, s)`. It makes no
//! promise about the recovery id, nor that the card actually used the wallet
//! the caller asked for; both are settled downstream by the
//! [`resolver`](crate::resolver).
//!
//! Card SDKs usually expose a plural "sign these hashes" call instead. The
//! [`CardSession`] trait models that API and [`CardHashSigner`] adapts it.
//!
//! # Example
//!
//! ```ignore
//! use card_evm_signer_core::signer::{CardHashSigner, HashSigner};
//!
//! // `session` comes from the platform card SDK, already scanned and connected.
//! let signer = CardHashSigner::new(session);
//! let raw = signer.sign(tx.signing_hash(), &wallet_key).await?;
//! ```

use alloy_primitives::B256;
use async_trait::async_trait;
use tracing::debug;

use crate::address::PublicKey;
use crate::error::{Error, Result};
use crate::signature::RawSignature;

/// A device that signs digests but does not report the recovery id.
#[async_trait]
pub trait HashSigner: Send + Sync {
    /// Signs `hash` with the wallet identified by `wallet_public_key`.
    ///
    /// A session with the device must already be active.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SigningFailed`] on any device or session failure.
    async fn sign(&self, hash: B256, wallet_public_key: &PublicKey) -> Result<RawSignature>;
}

/// An active session with a card that signs batches of hashes.
///
/// Signatures come back as hex `r || s` strings, one per input hash, in order.
#[async_trait]
pub trait CardSession: Send + Sync {
    /// Signs every hash in `hashes` with the wallet `wallet_public_key`.
    ///
    /// # Errors
    ///
    /// Any error is surfaced to the caller as [`Error::SigningFailed`].
    async fn sign_hashes(&self, hashes: &[B256], wallet_public_key: &[u8]) -> Result<Vec<String>>;
}

/// Adapts a plural-hash [`CardSession`] to the single-hash [`HashSigner`].
///
/// The card API rejects a single-element batch, so the digest is submitted
/// twice and the first signature is kept.
#[derive(Debug)]
pub struct CardHashSigner<S> {
    session: S,
}

impl<S: CardSession> CardHashSigner<S> {
    /// Wraps an active card session.
    pub const fn new(session: S) -> Self {
        Self { session }
    }

    /// Returns the underlying session.
    pub const fn session(&self) -> &S {
        &self.session
    }
}

#[async_trait]
impl<S: CardSession> HashSigner for CardHashSigner<S> {
    async fn sign(&self, hash: B256, wallet_public_key: &PublicKey) -> Result<RawSignature> {
        debug!(%hash, "requesting card signature");

        let signatures = self
            .session
            .sign_hashes(&[hash, hash], wallet_public_key.as_bytes())
            .await
            .map_err(|e| match e {
                Error::SigningFailed(_) => e,
                other => Error::SigningFailed(other.to_string()),
            })?;

        let first = signatures
            .first()
            .ok_or_else(|| Error::SigningFailed("card returned no signatures".to_string()))?;

        RawSignature::from_hex(first)
            .map_err(|e| Error::SigningFailed(format!("malformed card signature: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use alloy_primitives::keccak256;

    use super::*;
    use crate::address::Curve;

    /// Records the batch it was given and replays a canned answer.
    struct MockSession {
        answer: Mutex<Option<Result<Vec<String>>>>,
        seen: Mutex<Vec<B256>>,
    }

    impl MockSession {
        fn new(answer: Result<Vec<String>>) -> Self {
            Self {
                answer: Mutex::new(Some(answer)),
                seen: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl CardSession for MockSession {
        async fn sign_hashes(&self, hashes: &[B256], _key: &[u8]) -> Result<Vec<String>> {
            self.seen.lock().unwrap().extend_from_slice(hashes);
            self.answer.lock().unwrap().take().unwrap()
        }
    }

    fn wallet() -> PublicKey {
        PublicKey::new(vec![0x02; 33], Curve::Secp256k1)
    }

    #[tokio::test]
    async fn submits_the_hash_twice_and_keeps_the_first() {
        let first = format!("{}{}", "11".repeat(32), "22".repeat(32));
        let second = format!("{}{}", "33".repeat(32), "44".repeat(32));
        let signer = CardHashSigner::new(MockSession::new(Ok(vec![first.clone(), second])));
        let hash = keccak256(b"card");

        let raw = signer.sign(hash, &wallet()).await.unwrap();

        assert_eq!(raw, RawSignature::from_hex(&first).unwrap());
        assert_eq!(*signer.session().seen.lock().unwrap(), vec![hash, hash]);
    }

    #[tokio::test]
    async fn session_errors_become_signing_failed() {
        let signer = CardHashSigner::new(MockSession::new(Err(Error::InvalidConfig(
            "tag lost".into(),
        ))));

        let err = signer.sign(B256::ZERO, &wallet()).await.unwrap_err();
        assert!(matches!(err, Error::SigningFailed(ref m) if m.contains("tag lost")));
    }

    #[tokio::test]
    async fn empty_or_malformed_output_is_signing_failed() {
        let empty = CardHashSigner::new(MockSession::new(Ok(vec![])));
        assert!(matches!(
            empty.sign(B256::ZERO, &wallet()).await,
            Err(Error::SigningFailed(_))
        ));

        let short = CardHashSigner::new(MockSession::new(Ok(vec!["abcd".to_string()])));
        assert!(matches!(
            short.sign(B256::ZERO, &wallet()).await,
            Err(Error::SigningFailed(_))
        ));
    }
}
