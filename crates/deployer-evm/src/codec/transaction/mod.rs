// Transaction records exchanged between the builder, the signer and the ledger client

pub mod builder;
pub mod types;

pub use builder::{
    build_call, build_creation, encode_call_data, encode_creation_data, SenderContext,
};
pub use types::{ReceiptStatus, SignedTransaction, TransactionReceipt, UnsignedTransaction};
