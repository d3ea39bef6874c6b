//! Transaction signing with an in-memory secp256k1 key.
//!
//! Key material is only materialized inside [`KeySource::with_key`] and
//! [`sign_transaction`]; the derived signing key is zeroized when it drops.

use std::fmt;

use alloy::consensus::{SignableTransaction, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::hex;
use alloy::primitives::{Address, Bytes};
use alloy::signers::k256::ecdsa::SigningKey;
use alloy::signers::SignerSync;
use alloy_signer_local::LocalSigner;
use error_stack::{Report, ResultExt};
use zeroize::Zeroizing;

use crate::codec::transaction::{SignedTransaction, UnsignedTransaction};
use crate::errors::{DeployError, DeployResult};

pub type SecretKeySigner = LocalSigner<SigningKey>;

/// Hex-encoded secp256k1 secret. Wiped from memory on drop and never printed.
#[derive(Clone)]
pub struct PrivateKey(Zeroizing<String>);

impl PrivateKey {
    pub fn new(secret: impl Into<String>) -> Self {
        PrivateKey(Zeroizing::new(secret.into()))
    }

    fn to_signer(&self) -> DeployResult<SecretKeySigner> {
        let trimmed = self.0.trim();
        let secret = Zeroizing::new(hex::decode(trimmed).map_err(|_| {
            Report::new(DeployError::InvalidKey("secret key is not valid hex".to_string()))
        })?);
        if secret.len() != 32 {
            return Err(Report::new(DeployError::InvalidKey(format!(
                "secret key must be 32 bytes, got {}",
                secret.len()
            ))));
        }
        let signing_key = SigningKey::from_slice(&secret).map_err(|_| {
            Report::new(DeployError::InvalidKey(
                "secret key is not a valid secp256k1 scalar".to_string(),
            ))
        })?;
        Ok(SecretKeySigner::from_signing_key(signing_key))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([redacted])")
    }
}

/// Where the sender's key is read from each time a transaction is signed.
#[derive(Clone, Debug)]
pub enum KeySource {
    /// Name of an environment variable holding the hex secret
    Env(String),
    Inline(PrivateKey),
}

impl KeySource {
    pub fn env(variable: &str) -> Self {
        KeySource::Env(variable.to_string())
    }

    /// Scoped acquisition: the key exists only for the duration of `f`.
    pub fn with_key<T, F>(&self, f: F) -> DeployResult<T>
    where
        F: FnOnce(&PrivateKey) -> DeployResult<T>,
    {
        match self {
            KeySource::Env(variable) => {
                let secret = std::env::var(variable).map_err(|_| {
                    Report::new(DeployError::InvalidKey(format!(
                        "environment variable {} is not set",
                        variable
                    )))
                })?;
                let key = PrivateKey::new(secret);
                f(&key)
            }
            KeySource::Inline(key) => f(key),
        }
    }

    pub fn address(&self) -> DeployResult<Address> {
        self.with_key(address_of)
    }
}

pub fn address_of(key: &PrivateKey) -> DeployResult<Address> {
    Ok(key.to_signer()?.address())
}

/// Signs `tx` with RFC 6979 deterministic ECDSA and EIP-155 replay protection.
///
/// Invalid key material is reported as `InvalidKey`; everything else that can
/// go wrong while signing surfaces as `Signing`.
pub fn sign_transaction(
    tx: &UnsignedTransaction,
    key: &PrivateKey,
) -> DeployResult<SignedTransaction> {
    let signer = key.to_signer()?;
    if signer.address() != tx.from {
        return Err(Report::new(DeployError::Signing(format!(
            "key does not belong to sender {}",
            tx.from
        )))
        .attach(tx.context(None)));
    }

    let legacy = tx.to_legacy()?;
    let signature = signer
        .sign_hash_sync(&legacy.signature_hash())
        .map_err(|e| Report::new(DeployError::Signing(e.to_string())))
        .attach(tx.context(None))?;
    let signed = legacy.into_signed(signature);
    let raw = TxEnvelope::from(signed.clone()).encoded_2718();

    Ok(SignedTransaction::new(tx.clone(), signed, Bytes::from(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DeployReportExt, ErrorKind};
    use crate::tests::fixtures::{test_key, TEST_ADDRESS};
    use alloy::eips::eip2718::Decodable2718;
    use alloy::primitives::U256;
    use test_case::test_case;

    fn unsigned(nonce: u64) -> UnsignedTransaction {
        UnsignedTransaction {
            from: TEST_ADDRESS,
            to: None,
            data: Bytes::from(vec![0x60, 0x80, 0x60, 0x40]),
            value: U256::ZERO,
            gas_price: 1_000_000_000,
            gas_limit: Some(100_000),
            chain_id: 1337,
            nonce,
        }
    }

    #[test]
    fn test_address_of_known_key() {
        assert_eq!(address_of(&test_key()).unwrap(), TEST_ADDRESS);
    }

    #[test]
    fn test_signing_is_deterministic() {
        let tx = unsigned(3);
        let first = sign_transaction(&tx, &test_key()).unwrap();
        let second = sign_transaction(&tx, &test_key()).unwrap();
        assert_eq!(first.raw(), second.raw());
        assert_eq!(first.signature_bytes(), second.signature_bytes());
        assert_eq!(first.hash(), second.hash());
    }

    #[test]
    fn test_different_nonce_changes_signature() {
        let first = sign_transaction(&unsigned(0), &test_key()).unwrap();
        let second = sign_transaction(&unsigned(1), &test_key()).unwrap();
        assert_ne!(first.signature_bytes(), second.signature_bytes());
    }

    #[test]
    fn test_raw_encoding_round_trips_fields() {
        let signed = sign_transaction(&unsigned(9), &test_key()).unwrap();
        let envelope = TxEnvelope::decode_2718(&mut signed.raw().as_ref()).unwrap();
        let legacy = envelope.as_legacy().unwrap().tx();
        assert_eq!(legacy.nonce, 9);
        assert_eq!(legacy.chain_id, Some(1337));
        assert_eq!(legacy.gas_limit, 100_000);
    }

    #[test_case("zz"; "not hex")]
    #[test_case("0x1234"; "too short")]
    #[test_case(
        "0x0000000000000000000000000000000000000000000000000000000000000000";
        "zero scalar"
    )]
    fn test_invalid_key(secret: &str) {
        let error = sign_transaction(&unsigned(0), &PrivateKey::new(secret)).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidKey);
        assert!(!format!("{:?}", error).contains(secret));
    }

    #[test]
    fn test_missing_gas_limit_is_a_signing_error() {
        let tx = UnsignedTransaction { gas_limit: None, ..unsigned(0) };
        let error = sign_transaction(&tx, &test_key()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Signing);
    }

    #[test]
    fn test_foreign_sender_is_a_signing_error() {
        let tx = UnsignedTransaction { from: Address::ZERO, ..unsigned(0) };
        let error = sign_transaction(&tx, &test_key()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Signing);
    }

    #[test]
    fn test_private_key_is_redacted() {
        let rendered = format!("{:?}", KeySource::Inline(test_key()));
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains("ac0974bec39a17e3"));
    }

    #[test]
    fn test_env_key_source_missing_variable() {
        let source = KeySource::env("DEPLOYER_TEST_KEY_THAT_IS_NEVER_SET");
        let error = source.address().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidKey);
    }
}
