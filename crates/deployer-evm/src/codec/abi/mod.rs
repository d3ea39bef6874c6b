// ABI encoding and decoding module
// Arguments travel as tagged `AbiValue`s and are checked against the
// parameter types declared by the contract ABI before encoding.

pub mod decoding;
pub mod encoding;
pub mod value;

pub use decoding::{decode_function_output, from_sol_value};
pub use encoding::{
    encode_constructor_args, encode_function_args, resolve_function, to_sol_value,
};
pub use value::AbiValue;
