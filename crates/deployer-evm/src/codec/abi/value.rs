use std::fmt;

use alloy::dyn_abi::DynSolType;
use alloy::hex;
use alloy::primitives::{Address, I256, U256};
use error_stack::{Report, ResultExt};
use serde_json::Value as JsonValue;

use super::decoding::from_sol_value;
use crate::errors::{DeployError, DeployResult};

/// A contract argument or return value, one variant per supported ABI type family.
///
/// Integer widths, fixed-bytes sizes and array lengths are not part of the
/// value: they come from the ABI parameter the value is encoded against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbiValue {
    Uint(U256),
    Int(I256),
    Address(Address),
    Bool(bool),
    /// Dynamic `bytes`
    Bytes(Vec<u8>),
    /// `bytes1` through `bytes32`
    FixedBytes(Vec<u8>),
    String(String),
    /// Dynamic `T[]` or fixed `T[N]`
    Array(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    pub fn uint(value: u64) -> Self {
        AbiValue::Uint(U256::from(value))
    }

    pub fn string(value: &str) -> Self {
        AbiValue::String(value.to_string())
    }

    /// Parses a textual value against a solidity type, e.g. `("uint256", "256")`.
    pub fn parse(solidity_type: &str, text: &str) -> DeployResult<Self> {
        let sol_type = DynSolType::parse(solidity_type)
            .map_err(|e| {
                Report::new(DeployError::ArgumentMismatch(format!(
                    "unknown solidity type '{}': {}",
                    solidity_type, e
                )))
            })?;
        let sol_value = sol_type
            .coerce_str(text)
            .map_err(|e| {
                Report::new(DeployError::ArgumentMismatch(format!(
                    "'{}' is not a valid {}: {}",
                    text, solidity_type, e
                )))
            })?;
        from_sol_value(sol_value).attach_printable(format!("Parsing {} value", solidity_type))
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            AbiValue::Uint(value) => Some(*value),
            _ => None,
        }
    }

    /// Short name of the variant, used in mismatch diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            AbiValue::Uint(_) => "uint",
            AbiValue::Int(_) => "int",
            AbiValue::Address(_) => "address",
            AbiValue::Bool(_) => "bool",
            AbiValue::Bytes(_) => "bytes",
            AbiValue::FixedBytes(_) => "fixed bytes",
            AbiValue::String(_) => "string",
            AbiValue::Array(_) => "array",
            AbiValue::Tuple(_) => "tuple",
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            AbiValue::Uint(value) => JsonValue::String(value.to_string()),
            AbiValue::Int(value) => JsonValue::String(value.to_string()),
            AbiValue::Address(value) => JsonValue::String(value.to_checksum(None)),
            AbiValue::Bool(value) => JsonValue::Bool(*value),
            AbiValue::Bytes(bytes) | AbiValue::FixedBytes(bytes) => {
                JsonValue::String(format!("0x{}", hex::encode(bytes)))
            }
            AbiValue::String(value) => JsonValue::String(value.clone()),
            AbiValue::Array(values) | AbiValue::Tuple(values) => {
                JsonValue::Array(values.iter().map(|v| v.to_json()).collect())
            }
        }
    }
}

impl fmt::Display for AbiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiValue::Uint(value) => write!(f, "{}", value),
            AbiValue::Int(value) => write!(f, "{}", value),
            AbiValue::Address(value) => write!(f, "{}", value.to_checksum(None)),
            AbiValue::Bool(value) => write!(f, "{}", value),
            AbiValue::Bytes(bytes) | AbiValue::FixedBytes(bytes) => {
                write!(f, "0x{}", hex::encode(bytes))
            }
            AbiValue::String(value) => write!(f, "{:?}", value),
            AbiValue::Array(values) => {
                let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            AbiValue::Tuple(values) => {
                let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "({})", items.join(", "))
            }
        }
    }
}
