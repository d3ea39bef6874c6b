use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Bytes, U256};
use error_stack::{Report, ResultExt};

use super::types::UnsignedTransaction;
use crate::codec::abi::{encode_constructor_args, encode_function_args, AbiValue};
use crate::errors::{DeployError, DeployResult};

/// Sender-side fields shared by creation and call transactions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SenderContext {
    pub from: Address,
    pub chain_id: u64,
    pub gas_price: u128,
    pub nonce: u64,
}

/// Creation payload: bytecode followed by the encoded constructor arguments.
pub fn encode_creation_data(
    bytecode: &Bytes,
    abi: &JsonAbi,
    constructor_args: &[AbiValue],
) -> DeployResult<Bytes> {
    if bytecode.is_empty() {
        return Err(Report::new(DeployError::Codec(
            "contract bytecode is empty; is the contract abstract or an interface?".to_string(),
        )));
    }
    let encoded_args = encode_constructor_args(abi, constructor_args)?;
    let mut data = Vec::with_capacity(bytecode.len() + encoded_args.len());
    data.extend_from_slice(bytecode);
    data.extend_from_slice(&encoded_args);
    Ok(Bytes::from(data))
}

pub fn encode_call_data(abi: &JsonAbi, method: &str, args: &[AbiValue]) -> DeployResult<Bytes> {
    encode_function_args(abi, method, args).map(Bytes::from)
}

pub fn build_creation(
    bytecode: &Bytes,
    abi: &JsonAbi,
    constructor_args: &[AbiValue],
    sender: &SenderContext,
) -> DeployResult<UnsignedTransaction> {
    let data = encode_creation_data(bytecode, abi, constructor_args)
        .attach_printable("Building contract creation transaction")?;
    Ok(UnsignedTransaction {
        from: sender.from,
        to: None,
        data,
        value: U256::ZERO,
        gas_price: sender.gas_price,
        gas_limit: None,
        chain_id: sender.chain_id,
        nonce: sender.nonce,
    })
}

pub fn build_call(
    contract_address: Address,
    abi: &JsonAbi,
    method: &str,
    args: &[AbiValue],
    sender: &SenderContext,
    value: U256,
) -> DeployResult<UnsignedTransaction> {
    let data = encode_call_data(abi, method, args)
        .attach_printable(format!("Building call to '{}' on {}", method, contract_address))?;
    Ok(UnsignedTransaction {
        from: sender.from,
        to: Some(contract_address),
        data,
        value,
        gas_price: sender.gas_price,
        gas_limit: None,
        chain_id: sender.chain_id,
        nonce: sender.nonce,
    })
}
