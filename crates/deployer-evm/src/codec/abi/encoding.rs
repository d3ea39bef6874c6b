use alloy::dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier, Word};
use alloy::json_abi::{Function, JsonAbi, Param};
use alloy::primitives::{I256, U256};
use error_stack::{Report, ResultExt};

use super::value::AbiValue;
use crate::errors::{DeployError, DeployResult};

/// Finds the ABI entry for `name` taking `arity` arguments.
///
/// Overloads are disambiguated by argument count only.
pub fn resolve_function<'a>(
    abi: &'a JsonAbi,
    name: &str,
    arity: usize,
) -> DeployResult<&'a Function> {
    let Some(candidates) = abi.function(name) else {
        let mut error = Report::new(DeployError::UnknownMethod { name: name.to_string() });
        let available: Vec<&str> = abi.functions.keys().map(|k| k.as_str()).collect();
        if !available.is_empty() {
            error =
                error.attach_printable(format!("Available functions: {}", available.join(", ")));
        }
        for candidate in &available {
            if candidate.eq_ignore_ascii_case(name) {
                error = error.attach_printable(format!(
                    "Did you mean '{}'? (case-sensitive)",
                    candidate
                ));
            }
        }
        return Err(error);
    };

    candidates.iter().find(|f| f.inputs.len() == arity).ok_or_else(|| {
        let expected: Vec<String> = candidates.iter().map(|f| f.inputs.len().to_string()).collect();
        Report::new(DeployError::ArgumentMismatch(format!(
            "function '{}' expects {} argument(s), got {}",
            name,
            expected.join(" or "),
            arity
        )))
    })
}

/// Encodes a method call: 4-byte selector followed by the encoded arguments.
pub fn encode_function_args(
    abi: &JsonAbi,
    function_name: &str,
    args: &[AbiValue],
) -> DeployResult<Vec<u8>> {
    let function = resolve_function(abi, function_name, args.len())?;
    let sol_values = to_sol_params(args, &function.inputs)
        .attach_printable(format!("Encoding arguments for function '{}'", function_name))?;
    function.abi_encode_input(&sol_values).map_err(|e| {
        Report::new(DeployError::ArgumentMismatch(format!(
            "failed to encode arguments for '{}': {}",
            function_name, e
        )))
    })
}

/// Encodes constructor arguments. A contract without a declared constructor
/// accepts an empty argument list, which encodes to nothing.
pub fn encode_constructor_args(abi: &JsonAbi, args: &[AbiValue]) -> DeployResult<Vec<u8>> {
    let Some(constructor) = abi.constructor() else {
        if args.is_empty() {
            return Ok(vec![]);
        }
        return Err(Report::new(DeployError::ArgumentMismatch(format!(
            "contract declares no constructor but {} argument(s) were provided",
            args.len()
        ))));
    };

    if constructor.inputs.len() != args.len() {
        return Err(Report::new(DeployError::ArgumentMismatch(format!(
            "constructor expects {} argument(s), got {}",
            constructor.inputs.len(),
            args.len()
        ))));
    }

    let sol_values = to_sol_params(args, &constructor.inputs)
        .attach_printable("Encoding constructor arguments")?;
    constructor.abi_encode_input(&sol_values).map_err(|e| {
        Report::new(DeployError::ArgumentMismatch(format!(
            "failed to encode constructor arguments: {}",
            e
        )))
    })
}

fn to_sol_params(values: &[AbiValue], params: &[Param]) -> DeployResult<Vec<DynSolValue>> {
    let mut sol_values = Vec::with_capacity(params.len());
    for (i, (value, param)) in values.iter().zip(params.iter()).enumerate() {
        let sol_type = param.resolve().map_err(|e| {
            Report::new(DeployError::Codec(format!("unsupported ABI type '{}': {}", param.ty, e)))
        })?;
        let sol_value = to_sol_value(value, &sol_type).attach_printable(format!(
            "Encoding parameter #{} ({}: {})",
            i + 1,
            if param.name.is_empty() { "arg" } else { &param.name },
            param.ty
        ))?;
        sol_values.push(sol_value);
    }
    Ok(sol_values)
}

/// Checks `value` against `sol_type` and converts it for encoding.
pub fn to_sol_value(value: &AbiValue, sol_type: &DynSolType) -> DeployResult<DynSolValue> {
    let sol_value = match (value, sol_type) {
        (AbiValue::Uint(v), DynSolType::Uint(bits)) => {
            if v.bit_len() > *bits {
                return Err(mismatch(value, sol_type, "value does not fit"));
            }
            DynSolValue::Uint(*v, *bits)
        }
        (AbiValue::Uint(v), DynSolType::Int(bits)) => {
            let signed = I256::try_from(*v)
                .map_err(|_| mismatch(value, sol_type, "value does not fit"))?;
            if v.bit_len() >= *bits {
                return Err(mismatch(value, sol_type, "value does not fit"));
            }
            DynSolValue::Int(signed, *bits)
        }
        (AbiValue::Int(v), DynSolType::Int(bits)) => {
            if !int_fits(v, *bits) {
                return Err(mismatch(value, sol_type, "value does not fit"));
            }
            DynSolValue::Int(*v, *bits)
        }
        (AbiValue::Address(v), DynSolType::Address) => DynSolValue::Address(*v),
        (AbiValue::Bool(v), DynSolType::Bool) => DynSolValue::Bool(*v),
        (AbiValue::Bytes(v), DynSolType::Bytes) => DynSolValue::Bytes(v.clone()),
        (AbiValue::FixedBytes(v), DynSolType::FixedBytes(size)) => {
            if v.len() != *size {
                return Err(mismatch(
                    value,
                    sol_type,
                    &format!("expected {} bytes, got {}", size, v.len()),
                ));
            }
            let mut word = Word::ZERO;
            word[..*size].copy_from_slice(v);
            DynSolValue::FixedBytes(word, *size)
        }
        (AbiValue::String(v), DynSolType::String) => DynSolValue::String(v.clone()),
        (AbiValue::Array(items), DynSolType::Array(inner)) => {
            DynSolValue::Array(to_sol_items(items, inner)?)
        }
        (AbiValue::Array(items), DynSolType::FixedArray(inner, size)) => {
            if items.len() != *size {
                return Err(mismatch(
                    value,
                    sol_type,
                    &format!("expected {} elements, got {}", size, items.len()),
                ));
            }
            DynSolValue::FixedArray(to_sol_items(items, inner)?)
        }
        (AbiValue::Tuple(items), DynSolType::Tuple(types)) => {
            if items.len() != types.len() {
                return Err(mismatch(
                    value,
                    sol_type,
                    &format!("expected {} fields, got {}", types.len(), items.len()),
                ));
            }
            let fields = items
                .iter()
                .zip(types.iter())
                .map(|(item, ty)| to_sol_value(item, ty))
                .collect::<DeployResult<Vec<_>>>()?;
            DynSolValue::Tuple(fields)
        }
        _ => return Err(mismatch(value, sol_type, "incompatible types")),
    };
    Ok(sol_value)
}

/// Two's complement range check: `-2^(bits-1) <= v <= 2^(bits-1) - 1`.
fn int_fits(v: &I256, bits: usize) -> bool {
    let magnitude = v.unsigned_abs();
    if v.is_negative() {
        (magnitude - U256::from(1)).bit_len() < bits
    } else {
        magnitude.bit_len() < bits
    }
}

fn to_sol_items(items: &[AbiValue], inner: &DynSolType) -> DeployResult<Vec<DynSolValue>> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            to_sol_value(item, inner).attach_printable(format!("Encoding array element #{}", i))
        })
        .collect()
}

fn mismatch(value: &AbiValue, sol_type: &DynSolType, reason: &str) -> Report<DeployError> {
    Report::new(DeployError::ArgumentMismatch(format!(
        "cannot encode {} value {} as {}: {}",
        value.type_name(),
        value,
        sol_type,
        reason
    )))
}
