use std::fmt;

use alloy::primitives::{Address, TxHash};
use error_stack::Report;

/// Failure kinds surfaced by every component of the deployment pipeline.
///
/// Each variant carries the underlying message so the orchestrating caller
/// can decide between retrying and aborting without inspecting strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeployError {
    /// The contract source could not be compiled
    #[error("compilation failed: {0}")]
    Compilation(String),
    /// The node could not be reached
    #[error("network error: {0}")]
    Network(String),
    /// The node answered with a semantic error, or a receipt reported failure
    #[error("chain error: {0}")]
    Chain(String),
    /// The node refused a raw transaction synchronously
    #[error("transaction rejected by node: {0}")]
    RejectedTransaction(String),
    /// No receipt showed up before the confirmation timeout
    #[error("transaction {tx_hash} was not confirmed within {timeout_ms}ms")]
    TransactionTimeout { tx_hash: TxHash, timeout_ms: u64 },
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("method '{name}' not found in contract ABI")]
    UnknownMethod { name: String },
    #[error("argument mismatch: {0}")]
    ArgumentMismatch(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Malformed ABI, bytecode or return data
    #[error("codec error: {0}")]
    Codec(String),
}

pub type DeployResult<T> = Result<T, Report<DeployError>>;

/// Flat discriminant of [`DeployError`], used for retry decisions and exit reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Compilation,
    Network,
    Chain,
    RejectedTransaction,
    TransactionTimeout,
    Signing,
    InvalidKey,
    UnknownMethod,
    ArgumentMismatch,
    Config,
    Codec,
}

impl ErrorKind {
    /// Only transport failures of read-only queries are safe to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Network)
    }

    /// A timed out transaction may still confirm: re-poll by hash, never resubmit.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, ErrorKind::TransactionTimeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Compilation => "CompilationError",
            ErrorKind::Network => "NetworkError",
            ErrorKind::Chain => "ChainError",
            ErrorKind::RejectedTransaction => "RejectedTransaction",
            ErrorKind::TransactionTimeout => "TransactionTimeout",
            ErrorKind::Signing => "SigningError",
            ErrorKind::InvalidKey => "InvalidKey",
            ErrorKind::UnknownMethod => "UnknownMethod",
            ErrorKind::ArgumentMismatch => "ArgumentMismatch",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Codec => "CodecError",
        };
        write!(f, "{}", name)
    }
}

impl DeployError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::Compilation(_) => ErrorKind::Compilation,
            DeployError::Network(_) => ErrorKind::Network,
            DeployError::Chain(_) => ErrorKind::Chain,
            DeployError::RejectedTransaction(_) => ErrorKind::RejectedTransaction,
            DeployError::TransactionTimeout { .. } => ErrorKind::TransactionTimeout,
            DeployError::Signing(_) => ErrorKind::Signing,
            DeployError::InvalidKey(_) => ErrorKind::InvalidKey,
            DeployError::UnknownMethod { .. } => ErrorKind::UnknownMethod,
            DeployError::ArgumentMismatch(_) => ErrorKind::ArgumentMismatch,
            DeployError::Config(_) => ErrorKind::Config,
            DeployError::Codec(_) => ErrorKind::Codec,
        }
    }
}

/// RPC call details attached to node-facing failures
#[derive(Debug, Clone)]
pub struct RpcContext {
    pub endpoint: String,
    pub method: String,
    pub params: Option<String>,
}

impl fmt::Display for RpcContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC {} on {}", self.method, self.endpoint)?;
        if let Some(params) = &self.params {
            write!(f, " with params {}", params)?;
        }
        Ok(())
    }
}

/// Transaction details for debugging. Never carries key material.
#[derive(Debug, Clone)]
pub struct TransactionContext {
    pub tx_hash: Option<TxHash>,
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: u64,
    pub chain_id: u64,
}

impl fmt::Display for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transaction from {}", self.from)?;
        match &self.to {
            Some(to) => write!(f, " to {}", to)?,
            None => write!(f, " (contract creation)")?,
        }
        write!(f, " nonce: {} chain: {}", self.nonce, self.chain_id)?;
        if let Some(hash) = &self.tx_hash {
            write!(f, " hash: {}", hash)?;
        }
        Ok(())
    }
}

/// Attached when a raw transaction was sent but the node's answer never came
/// back, so it may or may not be in the mempool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndeterminateBroadcast {
    pub tx_hash: TxHash,
}

impl fmt::Display for IndeterminateBroadcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Broadcast of {} is indeterminate: re-poll by hash, never resubmit", self.tx_hash)
    }
}

/// Helpers shared by every component to read the kind back out of a report
pub trait DeployReportExt {
    fn kind(&self) -> ErrorKind;

    /// True when the transaction may still confirm.
    fn is_indeterminate(&self) -> bool;
}

impl DeployReportExt for Report<DeployError> {
    fn kind(&self) -> ErrorKind {
        self.current_context().kind()
    }

    fn is_indeterminate(&self) -> bool {
        self.kind().is_indeterminate() || self.contains::<IndeterminateBroadcast>()
    }
}
