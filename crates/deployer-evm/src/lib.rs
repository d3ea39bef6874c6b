#[macro_use]
extern crate hiro_system_kit;

#[macro_use]
extern crate serde_derive;

pub mod codec;
pub mod compiler;
pub mod config;
pub mod constants;
pub mod context;
pub mod contract;
pub mod errors;
pub mod lifecycle;
pub mod rpc;
pub mod signers;

#[cfg(test)]
mod tests;

pub use alloy::primitives::{Address, Bytes, TxHash, U256};
pub use codec::abi::AbiValue;
pub use codec::transaction::{
    ReceiptStatus, SignedTransaction, TransactionReceipt, UnsignedTransaction,
};
pub use compiler::{ArtifactProvider, CachedArtifactProvider, CompiledArtifact, SolcCompiler};
pub use config::NetworkConfig;
pub use context::Context;
pub use contract::ContractBinding;
pub use errors::{DeployError, DeployResult, ErrorKind};
pub use lifecycle::{LifecycleManager, TransactionIntent, TransactionRecord, TransactionState};
pub use rpc::{EvmRpc, LedgerClient};
pub use signers::{KeySource, PrivateKey};
