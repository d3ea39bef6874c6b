use alloy::primitives::{address, U256};

use super::fixtures::simple_storage_abi;
use super::mock_ledger::MockLedger;
use crate::codec::abi::AbiValue;
use crate::contract::ContractBinding;
use crate::errors::{DeployReportExt, ErrorKind};
use crate::lifecycle::TransactionIntent;

#[tokio::test]
async fn test_call_on_address_without_code_is_a_codec_error() {
    let ledger = MockLedger::new();
    let binding = ContractBinding::new(
        address!("5FbDB2315678afecb367f032d93F642f64180aa3"),
        simple_storage_abi(),
    );

    let error = binding.call(&ledger, None, "retrieve", &[]).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Codec);
    assert_eq!(ledger.network_calls(), 1);
}

#[tokio::test]
async fn test_call_arity_is_checked_locally() {
    let ledger = MockLedger::new();
    let binding = ContractBinding::new(
        address!("5FbDB2315678afecb367f032d93F642f64180aa3"),
        simple_storage_abi(),
    );

    let error = binding.call(&ledger, None, "retrieve", &[AbiValue::uint(1)]).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ArgumentMismatch);
    assert_eq!(ledger.network_calls(), 0);
}

#[test]
fn test_intent_targets_binding() {
    let contract = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
    let binding = ContractBinding::new(contract, simple_storage_abi());
    let intent = binding.intent("store", vec![AbiValue::uint(256)], U256::ZERO);

    match &intent {
        TransactionIntent::Call { address, method, args, value, .. } => {
            assert_eq!(*address, contract);
            assert_eq!(method, "store");
            assert_eq!(args, &vec![AbiValue::uint(256)]);
            assert_eq!(*value, U256::ZERO);
        }
        other => panic!("unexpected intent {:?}", other),
    }
    assert_eq!(intent.label(), format!("call store() on {}", contract));
}
