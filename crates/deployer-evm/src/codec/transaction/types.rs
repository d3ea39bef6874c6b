use std::fmt;

use alloy::consensus::{Signed, TxLegacy};
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256};
use error_stack::Report;

use crate::errors::{DeployError, DeployResult, TransactionContext};

/// A fully specified legacy transaction awaiting a signature.
///
/// `to` is absent for contract creation. `gas_limit` stays empty until the
/// lifecycle manager fills it from configuration or a node estimate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub from: Address,
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
    pub gas_price: u128,
    pub gas_limit: Option<u64>,
    pub chain_id: u64,
    pub nonce: u64,
}

impl UnsignedTransaction {
    pub fn is_creation(&self) -> bool {
        self.to.is_none()
    }

    pub fn with_gas_limit(self, gas_limit: u64) -> Self {
        UnsignedTransaction { gas_limit: Some(gas_limit), ..self }
    }

    pub fn to_legacy(&self) -> DeployResult<TxLegacy> {
        let gas_limit = self.gas_limit.ok_or_else(|| {
            Report::new(DeployError::Signing("transaction has no gas limit".to_string()))
                .attach(self.context(None))
        })?;
        Ok(TxLegacy {
            chain_id: Some(self.chain_id),
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit,
            to: match self.to {
                Some(to) => TxKind::Call(to),
                None => TxKind::Create,
            },
            value: self.value,
            input: self.data.clone(),
        })
    }

    pub fn context(&self, tx_hash: Option<TxHash>) -> TransactionContext {
        TransactionContext {
            tx_hash,
            from: self.from,
            to: self.to,
            nonce: self.nonce,
            chain_id: self.chain_id,
        }
    }
}

/// An unsigned transaction together with its signature and broadcastable encoding.
#[derive(Clone, Debug)]
pub struct SignedTransaction {
    unsigned: UnsignedTransaction,
    signed: Signed<TxLegacy>,
    raw: Bytes,
}

impl SignedTransaction {
    pub(crate) fn new(unsigned: UnsignedTransaction, signed: Signed<TxLegacy>, raw: Bytes) -> Self {
        SignedTransaction { unsigned, signed, raw }
    }

    pub fn unsigned(&self) -> &UnsignedTransaction {
        &self.unsigned
    }

    pub fn hash(&self) -> TxHash {
        *self.signed.hash()
    }

    /// `r || s || v` form of the signature
    pub fn signature_bytes(&self) -> [u8; 65] {
        self.signed.signature().as_bytes()
    }

    /// EIP-2718 encoding handed to `eth_sendRawTransaction`
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Success,
    Failure,
}

impl ReceiptStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ReceiptStatus::Success)
    }
}

/// Node-issued record of a mined transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    pub status: ReceiptStatus,
    pub contract_address: Option<Address>,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

impl fmt::Display for TransactionReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "receipt for {} ({:?})", self.transaction_hash, self.status)?;
        if let Some(block) = self.block_number {
            write!(f, " in block {}", block)?;
        }
        if let Some(address) = &self.contract_address {
            write!(f, " created {}", address)?;
        }
        Ok(())
    }
}
