//! Transaction lifecycle manager.
//!
//! Drives every state-changing transaction of one sender through
//! build, sign, broadcast and confirmation, and owns the sender's local nonce
//! counter for the duration of a run. Read-only calls never come through here.

mod nonce;
mod state;

use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy_chains::Chain;
use error_stack::{Report, ResultExt};

pub use state::{TransactionRecord, TransactionState};

use self::nonce::NonceTracker;
use crate::codec::abi::AbiValue;
use crate::codec::transaction::{
    build_call, build_creation, encode_call_data, encode_creation_data, SenderContext,
    TransactionReceipt, UnsignedTransaction,
};
use crate::compiler::CompiledArtifact;
use crate::config::NetworkConfig;
use crate::constants::GAS_LIMIT_BUFFER_PERCENT;
use crate::context::Context;
use crate::contract::ContractBinding;
use crate::errors::{
    DeployError, DeployReportExt, DeployResult, ErrorKind, IndeterminateBroadcast,
};
use crate::rpc::{EvmRpc, LedgerClient};
use crate::signers::{sign_transaction, KeySource};

/// What the caller wants on chain.
#[derive(Clone, Debug)]
pub enum TransactionIntent {
    Creation {
        bytecode: Bytes,
        abi: JsonAbi,
        args: Vec<AbiValue>,
    },
    Call {
        address: Address,
        abi: JsonAbi,
        method: String,
        args: Vec<AbiValue>,
        value: U256,
    },
}

impl TransactionIntent {
    pub fn label(&self) -> String {
        match self {
            TransactionIntent::Creation { .. } => "contract creation".to_string(),
            TransactionIntent::Call { address, method, .. } => {
                format!("call {}() on {}", method, address)
            }
        }
    }

    /// Encodes the payload without touching the network, so that caller
    /// errors (unknown method, bad arguments) surface before any round trip.
    fn preflight(&self) -> DeployResult<()> {
        match self {
            TransactionIntent::Creation { bytecode, abi, args } => {
                encode_creation_data(bytecode, abi, args).map(|_| ())
            }
            TransactionIntent::Call { abi, method, args, .. } => {
                encode_call_data(abi, method, args).map(|_| ())
            }
        }
    }

    fn build(&self, sender: &SenderContext) -> DeployResult<UnsignedTransaction> {
        match self {
            TransactionIntent::Creation { bytecode, abi, args } => {
                build_creation(bytecode, abi, args, sender)
            }
            TransactionIntent::Call { address, abi, method, args, value } => {
                build_call(*address, abi, method, args, sender, *value)
            }
        }
    }
}

/// One manager per sender account and network.
///
/// Submissions are serialized through `&mut self`; concurrent submissions
/// from the same account must go through the same manager.
pub struct LifecycleManager<L: LedgerClient> {
    ledger: L,
    config: NetworkConfig,
    key_source: KeySource,
    nonces: NonceTracker,
    history: Vec<TransactionRecord>,
    ctx: Context,
}

impl LifecycleManager<EvmRpc> {
    /// Connects to `config.rpc_url` and reads the key from `config.private_key_env`.
    pub fn from_config(config: NetworkConfig, ctx: Context) -> DeployResult<Self> {
        config.validate()?;
        let ledger = EvmRpc::new(&config.rpc_url)?;
        let key_source = config.key_source();
        Ok(LifecycleManager::new(ledger, config, key_source, ctx))
    }
}

impl<L: LedgerClient> LifecycleManager<L> {
    pub fn new(ledger: L, config: NetworkConfig, key_source: KeySource, ctx: Context) -> Self {
        let nonces = NonceTracker::new(config.sender);
        LifecycleManager { ledger, config, key_source, nonces, history: vec![], ctx }
    }

    /// Skips the initial `getNonce` query and starts counting from `nonce`.
    pub fn with_starting_nonce(mut self, nonce: u64) -> Self {
        self.nonces = NonceTracker::with_starting_nonce(self.config.sender, nonce);
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn sender(&self) -> Address {
        self.config.sender
    }

    pub fn history(&self) -> &[TransactionRecord] {
        &self.history
    }

    /// Nonce the next submission will use, if the counter has been seeded.
    pub fn next_nonce(&self) -> Option<u64> {
        self.nonces.current()
    }

    /// Checks that the node serves the configured chain and that the key
    /// belongs to the configured sender.
    pub async fn verify_network(&self) -> DeployResult<()> {
        let chain_id = self.ledger.get_chain_id().await?;
        if chain_id != self.config.chain_id {
            return Err(Report::new(DeployError::Config(format!(
                "node at {} serves chain {} but network '{}' expects {}",
                self.ledger.endpoint(),
                chain_id,
                self.config.name,
                self.config.chain_id
            ))));
        }

        let address = self
            .key_source
            .address()
            .attach_printable("Deriving sender address from private key")?;
        if address != self.config.sender {
            return Err(Report::new(DeployError::Config(format!(
                "private key belongs to {} but the configured sender is {}",
                address, self.config.sender
            ))));
        }

        self.ctx.try_log(|logger| {
            info!(
                logger,
                "Connected to {} ({}) as {}",
                self.ledger.endpoint(),
                Chain::from_id(chain_id),
                self.config.sender
            )
        });
        Ok(())
    }

    /// Replaces the local nonce counter with the node's pending count.
    ///
    /// Never called implicitly. Typical use is after a `RejectedTransaction`.
    pub async fn resync_nonce(&mut self) -> DeployResult<u64> {
        self.nonces.resync(&self.ledger, &self.ctx).await
    }

    /// Deploys `artifact` and binds the resulting contract.
    pub async fn deploy(
        &mut self,
        artifact: &CompiledArtifact,
        constructor_args: Vec<AbiValue>,
    ) -> DeployResult<(ContractBinding, TransactionReceipt)> {
        let receipt = self
            .submit(TransactionIntent::Creation {
                bytecode: artifact.bytecode.clone(),
                abi: artifact.abi.clone(),
                args: constructor_args,
            })
            .await
            .attach_printable(format!("Deploying contract {}", artifact.contract_name))?;

        let address = receipt.contract_address.ok_or_else(|| {
            Report::new(DeployError::Chain(format!(
                "creation receipt {} carries no contract address",
                receipt.transaction_hash
            )))
            .attach(receipt.clone())
        })?;

        self.ctx.try_log(|logger| {
            info!(logger, "Contract {} deployed at {}", artifact.contract_name, address)
        });
        Ok((ContractBinding::new(address, artifact.abi.clone()), receipt))
    }

    /// Runs `intent` through `Built -> Signed -> Broadcast -> Pending` and
    /// waits for the receipt.
    pub async fn submit(&mut self, intent: TransactionIntent) -> DeployResult<TransactionReceipt> {
        let label = intent.label();
        intent.preflight()?;

        let gas_price = match self.config.gas_price {
            Some(gas_price) => gas_price,
            None => self.ledger.get_gas_price().await?,
        };
        let nonce = self.nonces.peek(&self.ledger, &self.ctx).await?;
        let sender = SenderContext {
            from: self.config.sender,
            chain_id: self.config.chain_id,
            gas_price,
            nonce,
        };
        let tx = intent.build(&sender)?;
        let gas_limit = match self.config.gas_limit {
            Some(gas_limit) => gas_limit,
            None => {
                let estimate = self
                    .ledger
                    .estimate_gas(&tx)
                    .await
                    .attach_printable(format!("Estimating gas for {}", label))?;
                pad_gas_estimate(estimate)
            }
        };
        let tx = tx.with_gas_limit(gas_limit);

        self.history.push(TransactionRecord::new(label.clone(), nonce));
        let index = self.history.len() - 1;
        self.log_transition(index);

        let signed = match self.key_source.with_key(|key| sign_transaction(&tx, key)) {
            Ok(signed) => signed,
            Err(e) => {
                self.advance(index, TransactionState::Failed);
                return Err(e.attach_printable(format!("Signing {}", label)));
            }
        };
        self.history[index].tx_hash = Some(signed.hash());
        self.advance(index, TransactionState::Signed);

        // From here on the nonce is spent, whatever the node answers.
        self.nonces.consume();
        self.advance(index, TransactionState::Broadcast);

        let tx_hash = match self.ledger.send_raw_transaction(signed.raw()).await {
            Ok(tx_hash) => tx_hash,
            Err(e) if e.kind() == ErrorKind::RejectedTransaction => {
                self.advance(index, TransactionState::Failed);
                return Err(e
                    .attach(signed.unsigned().context(Some(signed.hash())))
                    .attach_printable(format!("Broadcasting {}", label)));
            }
            // The node may have accepted the transaction before the answer was lost
            Err(e) => {
                self.ctx.try_log(|logger| {
                    warn!(
                        logger,
                        "Broadcast of {} is indeterminate, re-poll {} before resubmitting",
                        label,
                        signed.hash()
                    )
                });
                return Err(e
                    .attach(signed.unsigned().context(Some(signed.hash())))
                    .attach(IndeterminateBroadcast { tx_hash: signed.hash() })
                    .attach_printable(format!("Broadcasting {}", label)));
            }
        };
        if tx_hash != signed.hash() {
            self.ctx.try_log(|logger| {
                warn!(logger, "Node reported hash {} for local hash {}", tx_hash, signed.hash())
            });
            self.history[index].tx_hash = Some(tx_hash);
        }
        self.advance(index, TransactionState::Pending);

        self.confirm(index, tx_hash).await.attach(signed.unsigned().context(Some(tx_hash)))
    }

    /// Resumes waiting on a transaction by hash, typically after a
    /// `TransactionTimeout` or a broadcast that failed in transit. Nothing is
    /// ever re-broadcast.
    pub async fn await_confirmation(
        &mut self,
        tx_hash: TxHash,
    ) -> DeployResult<TransactionReceipt> {
        let index = self.history.iter().rposition(|r| r.tx_hash == Some(tx_hash));
        match index.map(|index| (index, self.history[index].state())) {
            Some((_, state)) if state.is_terminal() => self.lookup_receipt(tx_hash).await,
            Some((index, state)) => {
                // A broadcast whose answer was lost is tracked as pending from now on
                if state == TransactionState::Broadcast {
                    self.advance(index, TransactionState::Pending);
                }
                self.confirm(index, tx_hash).await
            }
            None => self.lookup_receipt(tx_hash).await,
        }
    }

    /// Polls for a receipt without touching any record.
    async fn lookup_receipt(&self, tx_hash: TxHash) -> DeployResult<TransactionReceipt> {
        let interval = self.config.poll_interval();
        let timeout = self.config.confirmation_timeout();
        self.ledger.wait_for_receipt(&tx_hash, interval, timeout).await
    }

    async fn confirm(&mut self, index: usize, tx_hash: TxHash) -> DeployResult<TransactionReceipt> {
        self.ctx.try_log(|logger| {
            info!(
                logger,
                "Waiting for receipt of {} (timeout {}ms)",
                tx_hash,
                self.config.confirmation_timeout_ms
            )
        });

        let outcome = self
            .ledger
            .wait_for_receipt(
                &tx_hash,
                self.config.poll_interval(),
                self.config.confirmation_timeout(),
            )
            .await;

        match &outcome {
            Ok(_) => self.advance(index, TransactionState::Confirmed),
            Err(e) if e.kind() == ErrorKind::TransactionTimeout => {
                self.advance(index, TransactionState::TimedOut)
            }
            Err(e) if e.kind() == ErrorKind::Chain => self.advance(index, TransactionState::Failed),
            // Transport trouble while polling says nothing about the transaction
            Err(_) => {}
        }
        outcome
    }

    /// Read-only call against current state. Never touches the nonce counter.
    pub async fn simulate(
        &self,
        contract: &ContractBinding,
        method: &str,
        args: &[AbiValue],
    ) -> DeployResult<Vec<AbiValue>> {
        contract.call(&self.ledger, Some(self.config.sender), method, args).await
    }

    fn advance(&mut self, index: usize, next: TransactionState) {
        let record = &mut self.history[index];
        let previous = record.state();
        if previous == next {
            return;
        }
        if record.advance(next) {
            self.log_transition(index);
        } else {
            self.ctx.try_log(|logger| {
                error!(logger, "Ignoring illegal transition {} -> {}", previous, next)
            });
        }
    }

    fn log_transition(&self, index: usize) {
        let record = &self.history[index];
        self.ctx.try_log(|logger| {
            info!(
                logger,
                "{} [nonce {}] {}{}",
                record.label,
                record.nonce,
                record.state(),
                record.tx_hash.map(|h| format!(" {}", h)).unwrap_or_default()
            )
        });
    }
}

fn pad_gas_estimate(estimate: u64) -> u64 {
    estimate.saturating_add(estimate.saturating_mul(GAS_LIMIT_BUFFER_PERCENT) / 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, 0)]
    #[test_case(21_000, 23_100)]
    #[test_case(u64::MAX, u64::MAX)]
    fn test_pad_gas_estimate(estimate: u64, padded: u64) {
        assert_eq!(pad_gas_estimate(estimate), padded);
    }
}
