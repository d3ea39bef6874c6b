// ABI value codec and transaction assembly

pub mod abi;
pub mod transaction;

pub use abi::AbiValue;
pub use transaction::builder::{
    build_call, build_creation, encode_call_data, encode_creation_data, SenderContext,
};
