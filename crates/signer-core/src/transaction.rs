//! EIP-1559 transactions: signing hash, wire encoding and decoding.
//!
//! # Signing Flow
//!
//! 1. Build an [`UnsignedTransaction`] (see [`builder`](crate::builder))
//! 2. Call [`UnsignedTransaction::signing_hash`] to get the digest for the card
//! 3. Resolve the recovery id (see [`resolver`](crate::resolver))
//! 4. Serialize the [`SignedTransaction`] with [`SignedTransaction::encoded`]
//!
//! # Example
//!
//! ```
//! use alloy_primitives::U256;
//! use card_evm_signer_core::{Address, UnsignedTransaction};
//!
//! let tx = UnsignedTransaction {
//!     chain_id: 1,
//!     nonce: 0,
//!     max_priority_fee_per_gas: U256::from(1u64),
//!     max_fee_per_gas: U256::from(30_000_000_000u64),
//!     gas_limit: 21000,
//!     to: Some(Address::zero()),
//!     value: U256::ZERO,
//!     data: Default::default(),
//!     access_list: vec![],
//! };
//!
//! let hash = tx.signing_hash();
//! assert!(!hash.is_zero());
//! ```

use alloy_primitives::{B256, Bytes, U256, keccak256};
use alloy_rlp::{Decodable, Encodable, Header, RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::crypto;
use crate::error::{Error, Result};
use crate::signature::Signature;

/// An access list entry for EIP-2930/EIP-1559 transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, RlpEncodable, RlpDecodable)]
pub struct AccessListEntry {
    /// The address being accessed.
    pub address: alloy_primitives::Address,

    /// The storage keys being accessed at this address.
    pub storage_keys: Vec<B256>,
}

/// The fields of an EIP-1559 (type 2) transaction before signing.
///
/// Built once per signing attempt and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    /// The chain ID.
    pub chain_id: u64,

    /// The sender's nonce.
    pub nonce: u64,

    /// The maximum priority fee per gas (tip).
    pub max_priority_fee_per_gas: U256,

    /// The maximum total fee per gas.
    pub max_fee_per_gas: U256,

    /// The gas limit.
    pub gas_limit: u64,

    /// The recipient address, or `None` for contract creation.
    pub to: Option<Address>,

    /// The value to transfer in wei.
    pub value: U256,

    /// The call data.
    pub data: Bytes,

    /// The access list.
    pub access_list: Vec<AccessListEntry>,
}

impl UnsignedTransaction {
    /// The EIP-2718 transaction type byte.
    pub const TX_TYPE: u8 = 0x02;

    /// Gas charged for any transaction before calldata and execution.
    pub const INTRINSIC_GAS: u64 = 21_000;

    /// Returns the transaction type byte.
    #[must_use]
    pub const fn tx_type(&self) -> u8 {
        Self::TX_TYPE
    }

    /// Checks the field rules a node applies before accepting the
    /// transaction into its pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransaction`] if `maxPriorityFeePerGas`
    /// exceeds `maxFeePerGas` or the gas limit is below the intrinsic cost.
    pub fn validate(&self) -> Result<()> {
        if self.max_priority_fee_per_gas > self.max_fee_per_gas {
            return Err(Error::InvalidTransaction(format!(
                "maxPriorityFeePerGas {} exceeds maxFeePerGas {}",
                self.max_priority_fee_per_gas, self.max_fee_per_gas
            )));
        }
        if self.gas_limit < Self::INTRINSIC_GAS {
            return Err(Error::InvalidTransaction(format!(
                "gas limit {} is below the intrinsic {}",
                self.gas_limit,
                Self::INTRINSIC_GAS
            )));
        }
        Ok(())
    }

    /// Computes the digest the card must sign:
    /// `keccak256(0x02 || rlp([chainId, nonce, maxPriorityFeePerGas,
    /// maxFeePerGas, gasLimit, to, value, data, accessList]))`.
    #[must_use]
    pub fn signing_hash(&self) -> B256 {
        let mut buf = Vec::with_capacity(256);
        buf.push(self.tx_type());
        encode_rlp_list(&mut buf, |buf| self.encode_fields(buf));
        keccak256(&buf)
    }

    /// Parses a transaction from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`] if parsing fails.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the transaction to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn encode_fields(&self, out: &mut Vec<u8>) {
        self.chain_id.encode(out);
        self.nonce.encode(out);
        self.max_priority_fee_per_gas.encode(out);
        self.max_fee_per_gas.encode(out);
        self.gas_limit.encode(out);
        encode_optional_address(self.to.as_ref(), out);
        self.value.encode(out);
        self.data.encode(out);
        self.access_list.encode(out);
    }

    fn decode_fields(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            chain_id: u64::decode(buf)?,
            nonce: u64::decode(buf)?,
            max_priority_fee_per_gas: U256::decode(buf)?,
            max_fee_per_gas: U256::decode(buf)?,
            gas_limit: u64::decode(buf)?,
            to: decode_optional_address(buf)?,
            value: U256::decode(buf)?,
            data: Bytes::decode(buf)?,
            access_list: Vec::<AccessListEntry>::decode(buf)?,
        })
    }
}

/// An EIP-1559 transaction with a resolved, verified signature.
///
/// Produced only by the [`resolver`](crate::resolver) (or by decoding wire
/// bytes) and consumed by the [`broadcast`](crate::broadcast) stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    tx: UnsignedTransaction,
    signature: Signature,
}

impl SignedTransaction {
    /// Pairs transaction fields with a signature, without checking it.
    #[must_use]
    pub const fn new(tx: UnsignedTransaction, signature: Signature) -> Self {
        Self { tx, signature }
    }

    /// Returns the transaction fields.
    #[must_use]
    pub const fn tx(&self) -> &UnsignedTransaction {
        &self.tx
    }

    /// Returns the signature.
    #[must_use]
    pub const fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Serializes to the EIP-2718 wire form:
    /// `0x02 || rlp([...fields, yParity, r, s])`.
    #[must_use]
    pub fn encoded(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.push(self.tx.tx_type());

        encode_rlp_list(&mut buf, |buf| {
            self.tx.encode_fields(buf);
            self.signature.y_parity().encode(buf);
            self.signature.r().encode(buf);
            self.signature.s().encode(buf);
        });

        buf
    }

    /// Parses the EIP-2718 wire form produced by [`Self::encoded`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::RlpDecodingFailed`] for a wrong type byte, malformed
    /// RLP, or trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (&tx_type, mut buf) = bytes
            .split_first()
            .ok_or_else(|| Error::RlpDecodingFailed("empty input".to_string()))?;
        if tx_type != UnsignedTransaction::TX_TYPE {
            return Err(Error::RlpDecodingFailed(format!(
                "unsupported transaction type {tx_type:#04x}"
            )));
        }

        let header = Header::decode(&mut buf)?;
        if !header.list {
            return Err(alloy_rlp::Error::UnexpectedString.into());
        }
        if header.payload_length != buf.len() {
            return Err(Error::RlpDecodingFailed(format!(
                "payload length {} does not match remaining {} bytes",
                header.payload_length,
                buf.len()
            )));
        }

        let tx = UnsignedTransaction::decode_fields(&mut buf)?;
        let y_parity = bool::decode(&mut buf)?;
        let r = U256::decode(&mut buf)?;
        let s = U256::decode(&mut buf)?;

        if !buf.is_empty() {
            return Err(Error::RlpDecodingFailed(format!(
                "{} trailing bytes in transaction payload",
                buf.len()
            )));
        }

        Ok(Self::new(tx, Signature::new(r, s, y_parity)))
    }

    /// Returns the transaction hash, `keccak256` of the wire encoding.
    #[must_use]
    pub fn tx_hash(&self) -> B256 {
        keccak256(self.encoded())
    }

    /// Recovers the sender from the signature.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`] if no key can be recovered.
    pub fn recover_sender(&self) -> Result<Address> {
        crypto::recover_address(&self.tx.signing_hash(), &self.signature)
    }

    /// Returns `true` if the signature recovers `expected_sender`.
    ///
    /// Any recovery failure counts as a mismatch.
    #[must_use]
    pub fn verify_signature(&self, expected_sender: Address) -> bool {
        self.recover_sender()
            .is_ok_and(|sender| sender == expected_sender)
    }
}

/// Encodes an RLP list using a closure to write elements.
fn encode_rlp_list<F>(out: &mut Vec<u8>, f: F)
where
    F: FnOnce(&mut Vec<u8>),
{
    let mut content = Vec::new();
    f(&mut content);

    let header = Header {
        list: true,
        payload_length: content.len(),
    };
    header.encode(out);
    out.extend_from_slice(&content);
}

/// Encodes an optional address; `None` is the empty string.
fn encode_optional_address(addr: Option<&Address>, out: &mut Vec<u8>) {
    match addr {
        Some(a) => a.inner().encode(out),
        None => out.push(alloy_rlp::EMPTY_STRING_CODE),
    }
}

fn decode_optional_address(buf: &mut &[u8]) -> Result<Option<Address>> {
    if buf.first() == Some(&alloy_rlp::EMPTY_STRING_CODE) {
        *buf = &buf[1..];
        return Ok(None);
    }
    Ok(Some(alloy_primitives::Address::decode(buf)?.into()))
}

#[cfg(test)]
mod tests {
    use k256::ecdsa::SigningKey;

    use super::*;
    use crate::signature::RawSignature;

    fn sample_tx() -> UnsignedTransaction {
        UnsignedTransaction {
            chain_id: 1,
            nonce: 7,
            max_priority_fee_per_gas: U256::from(1u64),
            max_fee_per_gas: U256::from(30_000_000_000u64),
            gas_limit: 21000,
            to: Some(Address::new([0x23; 20])),
            value: U256::ZERO,
            data: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
            access_list: vec![],
        }
    }

    fn sign(tx: &UnsignedTransaction, key: &SigningKey) -> SignedTransaction {
        let hash = tx.signing_hash();
        let (sig, recid) = key.sign_prehash_recoverable(hash.as_slice()).unwrap();
        let raw = RawSignature::from_bytes(&sig.to_bytes()).unwrap();
        SignedTransaction::new(tx.clone(), raw.with_parity(recid.is_y_odd()))
    }

    #[test]
    fn signing_hash_matches_reference_vector() {
        // Payload RLP assembled by hand: 31 bytes of fields under a 0xdf list header.
        let tx = UnsignedTransaction {
            chain_id: 1,
            nonce: 0,
            max_priority_fee_per_gas: U256::ZERO,
            max_fee_per_gas: U256::ZERO,
            gas_limit: 21000,
            to: Some(Address::from_hex("0x2309762aAcA0a8F689463a42c0A6A84BE3A7ea51").unwrap()),
            value: U256::ZERO,
            data: Bytes::new(),
            access_list: vec![],
        };

        let mut preimage = vec![0x02];
        preimage.extend_from_slice(&hex::decode(
            "df01808080825208942309762aaca0a8f689463a42c0a6a84be3a7ea518080c0",
        )
        .unwrap());
        assert_eq!(tx.signing_hash(), keccak256(&preimage));
    }

    #[test]
    fn signing_hash_depends_on_every_field() {
        let base = sample_tx();
        let mut bumped = base.clone();
        bumped.nonce += 1;
        assert_ne!(base.signing_hash(), bumped.signing_hash());

        let mut other_chain = base.clone();
        other_chain.chain_id = 137;
        assert_ne!(base.signing_hash(), other_chain.signing_hash());
    }

    #[test]
    fn validate_enforces_fee_order_and_intrinsic_gas() {
        assert!(sample_tx().validate().is_ok());

        let mut equal_fees = sample_tx();
        equal_fees.max_fee_per_gas = equal_fees.max_priority_fee_per_gas;
        assert!(equal_fees.validate().is_ok());

        let mut zero_fee_cap = sample_tx();
        zero_fee_cap.max_fee_per_gas = U256::ZERO;
        assert!(matches!(
            zero_fee_cap.validate(),
            Err(Error::InvalidTransaction(ref m)) if m.contains("maxPriorityFeePerGas")
        ));

        let mut starved = sample_tx();
        starved.gas_limit = UnsignedTransaction::INTRINSIC_GAS - 1;
        assert!(matches!(
            starved.validate(),
            Err(Error::InvalidTransaction(_))
        ));
    }

    #[test]
    fn encoded_starts_with_type_byte() {
        let signed = SignedTransaction::new(
            sample_tx(),
            RawSignature::new(U256::from(1), U256::from(2)).with_parity(true),
        );
        assert_eq!(signed.encoded()[0], UnsignedTransaction::TX_TYPE);
        assert_eq!(signed.tx().tx_type(), UnsignedTransaction::TX_TYPE);
    }

    #[test]
    fn decode_reproduces_fields_and_sender() {
        let key = SigningKey::from_slice(&[0x07; 32]).unwrap();
        let mut tx = sample_tx();
        tx.access_list = vec![AccessListEntry {
            address: alloy_primitives::Address::repeat_byte(0x11),
            storage_keys: vec![B256::repeat_byte(0x22)],
        }];
        let signed = sign(&tx, &key);

        let decoded = SignedTransaction::decode(&signed.encoded()).unwrap();

        assert_eq!(decoded, signed);
        assert_eq!(decoded.tx_hash(), signed.tx_hash());
        assert_eq!(
            decoded.recover_sender().unwrap(),
            Address::from_public_key(key.verifying_key())
        );
        assert!(decoded.verify_signature(Address::from_public_key(key.verifying_key())));
        assert!(!decoded.verify_signature(Address::zero()));
    }

    #[test]
    fn decode_contract_creation() {
        let key = SigningKey::from_slice(&[0x08; 32]).unwrap();
        let mut tx = sample_tx();
        tx.to = None;
        let signed = sign(&tx, &key);

        let decoded = SignedTransaction::decode(&signed.encoded()).unwrap();
        assert_eq!(decoded.tx().to, None);
    }

    #[test]
    fn decode_rejects_wrong_type_and_garbage() {
        let signed = SignedTransaction::new(
            sample_tx(),
            RawSignature::new(U256::from(1), U256::from(2)).with_parity(false),
        );
        let mut bytes = signed.encoded();

        bytes[0] = 0x01;
        assert!(matches!(
            SignedTransaction::decode(&bytes),
            Err(Error::RlpDecodingFailed(_))
        ));

        bytes[0] = 0x02;
        bytes.push(0x00);
        assert!(matches!(
            SignedTransaction::decode(&bytes),
            Err(Error::RlpDecodingFailed(_))
        ));

        assert!(SignedTransaction::decode(&[]).is_err());
    }

    #[test]
    fn transaction_json_roundtrip() {
        let original = sample_tx();
        let json = original.to_json().unwrap();
        let recovered = UnsignedTransaction::from_json(&json).unwrap();
        assert_eq!(original, recovered);
    }
}
