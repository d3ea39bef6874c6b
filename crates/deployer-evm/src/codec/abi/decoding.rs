use alloy::dyn_abi::{DynSolValue, FunctionExt};
use alloy::json_abi::Function;
use error_stack::{Report, ResultExt};

use super::value::AbiValue;
use crate::errors::{DeployError, DeployResult};

/// Decodes the return data of a simulated call into one value per declared output.
pub fn decode_function_output(function: &Function, data: &[u8]) -> DeployResult<Vec<AbiValue>> {
    if data.is_empty() && !function.outputs.is_empty() {
        return Err(Report::new(DeployError::Codec(format!(
            "call to '{}' returned no data; is a contract deployed at this address?",
            function.name
        ))));
    }
    let sol_values = function.abi_decode_output(data).map_err(|e| {
        Report::new(DeployError::Codec(format!(
            "failed to decode output of '{}': {}",
            function.name, e
        )))
    })?;
    sol_values
        .into_iter()
        .map(from_sol_value)
        .collect::<DeployResult<Vec<_>>>()
        .attach_printable(format!("Decoding output of function '{}'", function.name))
}

pub fn from_sol_value(value: DynSolValue) -> DeployResult<AbiValue> {
    let value = match value {
        DynSolValue::Bool(v) => AbiValue::Bool(v),
        DynSolValue::Int(v, _) => AbiValue::Int(v),
        DynSolValue::Uint(v, _) => AbiValue::Uint(v),
        DynSolValue::FixedBytes(word, size) => AbiValue::FixedBytes(word[..size].to_vec()),
        DynSolValue::Address(v) => AbiValue::Address(v),
        DynSolValue::Function(v) => AbiValue::FixedBytes(v.0.to_vec()),
        DynSolValue::Bytes(v) => AbiValue::Bytes(v),
        DynSolValue::String(v) => AbiValue::String(v),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => {
            AbiValue::Array(items.into_iter().map(from_sol_value).collect::<DeployResult<_>>()?)
        }
        DynSolValue::Tuple(items) => {
            AbiValue::Tuple(items.into_iter().map(from_sol_value).collect::<DeployResult<_>>()?)
        }
        #[allow(unreachable_patterns)]
        other => {
            return Err(Report::new(DeployError::Codec(format!(
                "unsupported ABI value {:?}",
                other
            ))))
        }
    };
    Ok(value)
}
