use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, Bytes, TxHash, TxKind};
use alloy::providers::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
};
use alloy::providers::{Identity, Provider, ProviderBuilder, RootProvider};
use alloy::rpc::json_rpc::RpcError;
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::transports::http::reqwest::Url;
use alloy::transports::TransportError;
use async_trait::async_trait;
use error_stack::{Report, ResultExt};
use tokio::time::{sleep, Instant};

use crate::codec::transaction::{ReceiptStatus, TransactionReceipt, UnsignedTransaction};
use crate::constants::{MAX_RPC_RETRIES, RPC_RETRY_BACKOFF_MS};
use crate::errors::{DeployError, DeployResult, RpcContext};

/// Network-facing handle to a single node endpoint.
///
/// Every method is one round trip (plus retries for read-only queries).
/// Implementations hold no per-account state: nonce bookkeeping belongs to
/// the lifecycle manager.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    fn endpoint(&self) -> String;

    async fn get_chain_id(&self) -> DeployResult<u64>;

    /// Pending transaction count of `account`, i.e. the next usable nonce.
    async fn get_nonce(&self, account: &Address) -> DeployResult<u64>;

    async fn get_gas_price(&self) -> DeployResult<u128>;

    async fn estimate_gas(&self, tx: &UnsignedTransaction) -> DeployResult<u64>;

    /// Executes `data` against `to` at the latest block without persisting anything.
    async fn call(&self, from: Option<Address>, to: Address, data: &Bytes) -> DeployResult<Bytes>;

    /// Broadcasts a signed transaction. Never retried.
    async fn send_raw_transaction(&self, raw: &[u8]) -> DeployResult<TxHash>;

    async fn get_receipt(&self, tx_hash: &TxHash) -> DeployResult<Option<TransactionReceipt>>;

    /// Polls for the receipt of `tx_hash` every `poll_interval` until `timeout` elapses.
    ///
    /// The node is queried at least once, so a zero timeout still returns a
    /// receipt that is already available. A receipt with failure status is
    /// returned as a `Chain` error carrying the receipt as an attachment.
    async fn wait_for_receipt(
        &self,
        tx_hash: &TxHash,
        poll_interval: Duration,
        timeout: Duration,
    ) -> DeployResult<TransactionReceipt> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(receipt) = self.get_receipt(tx_hash).await? {
                if receipt.status == ReceiptStatus::Success {
                    return Ok(receipt);
                }
                return Err(Report::new(DeployError::Chain(format!(
                    "transaction {} reverted in block {}",
                    tx_hash,
                    receipt.block_number.map(|b| b.to_string()).unwrap_or_else(|| "?".into())
                )))
                .attach(receipt));
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Report::new(DeployError::TransactionTimeout {
                    tx_hash: *tx_hash,
                    timeout_ms: timeout.as_millis() as u64,
                }));
            }
            sleep(poll_interval.min(deadline - now)).await;
        }
    }
}

#[async_trait]
impl<T: LedgerClient + ?Sized> LedgerClient for Arc<T> {
    fn endpoint(&self) -> String {
        (**self).endpoint()
    }

    async fn get_chain_id(&self) -> DeployResult<u64> {
        (**self).get_chain_id().await
    }

    async fn get_nonce(&self, account: &Address) -> DeployResult<u64> {
        (**self).get_nonce(account).await
    }

    async fn get_gas_price(&self) -> DeployResult<u128> {
        (**self).get_gas_price().await
    }

    async fn estimate_gas(&self, tx: &UnsignedTransaction) -> DeployResult<u64> {
        (**self).estimate_gas(tx).await
    }

    async fn call(&self, from: Option<Address>, to: Address, data: &Bytes) -> DeployResult<Bytes> {
        (**self).call(from, to, data).await
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> DeployResult<TxHash> {
        (**self).send_raw_transaction(raw).await
    }

    async fn get_receipt(&self, tx_hash: &TxHash) -> DeployResult<Option<TransactionReceipt>> {
        (**self).get_receipt(tx_hash).await
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: &TxHash,
        poll_interval: Duration,
        timeout: Duration,
    ) -> DeployResult<TransactionReceipt> {
        (**self).wait_for_receipt(tx_hash, poll_interval, timeout).await
    }
}

pub type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider,
>;

/// JSON-RPC over HTTP implementation of [`LedgerClient`]
#[derive(Clone, Debug)]
pub struct EvmRpc {
    pub url: Url,
    pub provider: HttpProvider,
}

impl EvmRpc {
    pub fn new(url: &str) -> DeployResult<Self> {
        let url = Url::try_from(url).map_err(|e| {
            Report::new(DeployError::Config(format!("invalid rpc_url '{}': {}", url, e)))
        })?;

        let provider = ProviderBuilder::new().on_http(url.clone());
        Ok(Self { url, provider })
    }

    fn rpc_context(&self, method: &str, params: Option<String>) -> RpcContext {
        RpcContext { endpoint: self.url.to_string(), method: method.to_string(), params }
    }

    /// Retries `f` on `Network` failures only, with linear backoff.
    async fn retry_async<T, Fut, F>(f: F) -> DeployResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = DeployResult<T>>,
    {
        let mut retries = 0;
        loop {
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if retries >= MAX_RPC_RETRIES || !e.current_context().kind().is_retryable() {
                        return Err(e);
                    }
                    retries += 1;
                    sleep(Duration::from_millis(RPC_RETRY_BACKOFF_MS * retries)).await;
                }
            }
        }
    }
}

/// Splits a provider error into transport failures and answers from the node.
///
/// A JSON-RPC error response is a semantic refusal: `Chain` for queries,
/// `RejectedTransaction` for broadcasts. Malformed responses are reported as
/// `Chain` too, since the node was reachable.
fn classify(error: TransportError, broadcast: bool) -> Report<DeployError> {
    let deploy_error = match &error {
        RpcError::ErrorResp(payload) => {
            let message = format!("{} (code {})", payload.message, payload.code);
            if broadcast {
                DeployError::RejectedTransaction(message)
            } else {
                DeployError::Chain(message)
            }
        }
        RpcError::Transport(_) => DeployError::Network(error.to_string()),
        _ => DeployError::Chain(error.to_string()),
    };
    Report::new(deploy_error)
}

/// Estimation request. The nonce is left for the node to fill so that a stale
/// nonce surfaces at broadcast rather than here.
fn to_request(tx: &UnsignedTransaction) -> TransactionRequest {
    TransactionRequest {
        from: Some(tx.from),
        to: Some(match tx.to {
            Some(to) => TxKind::Call(to),
            None => TxKind::Create,
        }),
        gas_price: Some(tx.gas_price),
        gas: tx.gas_limit,
        value: Some(tx.value),
        input: TransactionInput::new(tx.data.clone()),
        chain_id: Some(tx.chain_id),
        ..Default::default()
    }
}

#[async_trait]
impl LedgerClient for EvmRpc {
    fn endpoint(&self) -> String {
        self.url.to_string()
    }

    async fn get_chain_id(&self) -> DeployResult<u64> {
        EvmRpc::retry_async(|| async {
            self.provider
                .get_chain_id()
                .await
                .map_err(|e| classify(e, false))
                .attach(self.rpc_context("eth_chainId", None))
        })
        .await
    }

    async fn get_nonce(&self, account: &Address) -> DeployResult<u64> {
        EvmRpc::retry_async(|| async {
            self.provider
                .get_transaction_count(*account)
                .pending()
                .await
                .map_err(|e| classify(e, false))
                .attach(self.rpc_context(
                    "eth_getTransactionCount",
                    Some(format!("[\"{:?}\", \"pending\"]", account)),
                ))
                .attach_printable(format!("Getting nonce for address {}", account))
        })
        .await
    }

    async fn get_gas_price(&self) -> DeployResult<u128> {
        EvmRpc::retry_async(|| async {
            self.provider
                .get_gas_price()
                .await
                .map_err(|e| classify(e, false))
                .attach(self.rpc_context("eth_gasPrice", None))
        })
        .await
    }

    async fn estimate_gas(&self, tx: &UnsignedTransaction) -> DeployResult<u64> {
        let request = to_request(tx);
        EvmRpc::retry_async(|| async {
            self.provider
                .estimate_gas(request.clone())
                .await
                .map_err(|e| classify(e, false))
                .attach(self.rpc_context("eth_estimateGas", Some(format!("{:?}", request))))
                .attach(tx.context(None))
        })
        .await
    }

    async fn call(&self, from: Option<Address>, to: Address, data: &Bytes) -> DeployResult<Bytes> {
        let request = TransactionRequest {
            from,
            to: Some(TxKind::Call(to)),
            input: TransactionInput::new(data.clone()),
            ..Default::default()
        };
        EvmRpc::retry_async(|| async {
            self.provider
                .call(request.clone())
                .await
                .map_err(|e| classify(e, false))
                .attach(self.rpc_context("eth_call", Some(format!("[{{\"to\": \"{}\"}}]", to))))
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> DeployResult<TxHash> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| classify(e, true))
            .attach(self.rpc_context("eth_sendRawTransaction", None))?;
        Ok(*pending.tx_hash())
    }

    async fn get_receipt(&self, tx_hash: &TxHash) -> DeployResult<Option<TransactionReceipt>> {
        let receipt = EvmRpc::retry_async(|| async {
            self.provider
                .get_transaction_receipt(*tx_hash)
                .await
                .map_err(|e| classify(e, false))
                .attach(self.rpc_context(
                    "eth_getTransactionReceipt",
                    Some(format!("[\"{}\"]", tx_hash)),
                ))
        })
        .await?;

        Ok(receipt.map(|receipt| TransactionReceipt {
            transaction_hash: receipt.transaction_hash,
            status: if receipt.status() { ReceiptStatus::Success } else { ReceiptStatus::Failure },
            contract_address: receipt.contract_address,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used as u64,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DeployReportExt, ErrorKind};
    use crate::tests::mock_ledger::MockLedger;
    use alloy::rpc::json_rpc::ErrorPayload;
    use alloy::transports::TransportErrorKind;
    use std::sync::atomic::{AtomicU64, Ordering};
    use test_case::test_case;

    #[test]
    fn test_invalid_url_is_a_config_error() {
        let error = EvmRpc::new("not a url").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_valid_url() {
        let rpc = EvmRpc::new("http://127.0.0.1:8545").unwrap();
        assert_eq!(rpc.endpoint(), "http://127.0.0.1:8545/");
    }

    #[test_case(false, ErrorKind::Chain; "query")]
    #[test_case(true, ErrorKind::RejectedTransaction; "broadcast")]
    fn test_error_response_classification(broadcast: bool, expected: ErrorKind) {
        let payload: ErrorPayload = ErrorPayload {
            code: -32000,
            message: "nonce too low".into(),
            data: None,
        };
        let error: TransportError = RpcError::ErrorResp(payload);
        let report = classify(error, broadcast);
        assert_eq!(report.kind(), expected);
        assert!(report.current_context().to_string().contains("nonce too low"));
    }

    #[test]
    fn test_transport_failure_is_network() {
        let error = TransportErrorKind::custom_str("connection refused");
        assert_eq!(classify(error, true).kind(), ErrorKind::Network);
    }

    #[test]
    fn test_estimate_request_leaves_nonce_to_the_node() {
        let tx = UnsignedTransaction {
            from: Address::ZERO,
            to: None,
            data: Bytes::from(vec![0x60]),
            value: Default::default(),
            gas_price: 7,
            gas_limit: None,
            chain_id: 1337,
            nonce: 2,
        };
        let request = to_request(&tx);
        assert_eq!(request.to, Some(TxKind::Create));
        assert_eq!(request.nonce, None);
        assert_eq!(request.gas, None);
    }

    #[tokio::test]
    async fn test_retry_stops_on_non_network_errors() {
        let attempts = AtomicU64::new(0);
        let result: DeployResult<()> = EvmRpc::retry_async(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(Report::new(DeployError::Chain("execution reverted".into())))
        })
        .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Chain);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_network_retries() {
        let attempts = AtomicU64::new(0);
        let result: DeployResult<()> = EvmRpc::retry_async(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(Report::new(DeployError::Network("connection refused".into())))
        })
        .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Network);
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_RPC_RETRIES + 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let attempts = AtomicU64::new(0);
        let result = EvmRpc::retry_async(|| async {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Report::new(DeployError::Network("reset by peer".into())))
            } else {
                Ok(42u64)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_wait_for_receipt_zero_timeout_on_unmined_tx() {
        let ledger = MockLedger::new().mine_after_polls(None);
        let hash = TxHash::repeat_byte(0x11);
        ledger.register_pending(hash);
        let error = ledger
            .wait_for_receipt(&hash, Duration::from_millis(1), Duration::ZERO)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::TransactionTimeout);
        assert_eq!(ledger.receipt_polls(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_receipt_polls_until_mined() {
        let ledger = MockLedger::new().mine_after_polls(Some(3));
        let hash = TxHash::repeat_byte(0x22);
        ledger.register_pending(hash);
        let receipt = ledger
            .wait_for_receipt(&hash, Duration::from_millis(1), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(receipt.transaction_hash, hash);
        assert_eq!(ledger.receipt_polls(), 3);
    }
}
