use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, U256};
use error_stack::ResultExt;

use crate::codec::abi::{decode_function_output, resolve_function, AbiValue};
use crate::codec::transaction::{encode_call_data, TransactionReceipt};
use crate::errors::DeployResult;
use crate::lifecycle::{LifecycleManager, TransactionIntent};
use crate::rpc::LedgerClient;

/// A deployed contract: its address and the ABI used to talk to it.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractBinding {
    pub address: Address,
    pub abi: JsonAbi,
}

impl ContractBinding {
    pub fn new(address: Address, abi: JsonAbi) -> Self {
        ContractBinding { address, abi }
    }

    /// Simulated call: executed by the node against current state, nothing
    /// is signed or broadcast.
    pub async fn call<L: LedgerClient>(
        &self,
        ledger: &L,
        from: Option<Address>,
        method: &str,
        args: &[AbiValue],
    ) -> DeployResult<Vec<AbiValue>> {
        let function = resolve_function(&self.abi, method, args.len())?;
        let data = encode_call_data(&self.abi, method, args)?;
        let output = ledger
            .call(from, self.address, &data)
            .await
            .attach_printable(format!("Calling {}() on {}", method, self.address))?;
        decode_function_output(function, &output)
    }

    /// State-changing call routed through the lifecycle manager.
    pub async fn transact<L: LedgerClient>(
        &self,
        manager: &mut LifecycleManager<L>,
        method: &str,
        args: Vec<AbiValue>,
        value: U256,
    ) -> DeployResult<TransactionReceipt> {
        manager.submit(self.intent(method, args, value)).await
    }

    pub fn intent(&self, method: &str, args: Vec<AbiValue>, value: U256) -> TransactionIntent {
        TransactionIntent::Call {
            address: self.address,
            abi: self.abi.clone(),
            method: method.to_string(),
            args,
            value,
        }
    }
}
