use alloy::primitives::U256;

use super::anvil_harness::{compile_simple_storage, AnvilInstance};
use super::anvil_test;
use crate::codec::abi::AbiValue;
use crate::context::Context;
use crate::errors::{DeployReportExt, ErrorKind};
use crate::lifecycle::{LifecycleManager, TransactionState};
use crate::rpc::{EvmRpc, LedgerClient};
use crate::tests::fixtures::{test_key_source, TEST_ADDRESS};

fn anvil_manager(anvil: &AnvilInstance) -> LifecycleManager<EvmRpc> {
    let config = anvil.network_config();
    let ledger = EvmRpc::new(&config.rpc_url).unwrap();
    LifecycleManager::new(ledger, config, test_key_source(), Context::empty())
}

anvil_test!(test_deploy_store_retrieve_on_anvil, async {
    let anvil = AnvilInstance::spawn();
    let artifact = compile_simple_storage();
    let mut manager = anvil_manager(&anvil);
    manager.verify_network().await.unwrap();

    let (binding, receipt) = manager.deploy(&artifact, vec![]).await.unwrap();
    assert_eq!(receipt.contract_address, Some(binding.address));
    assert_eq!(binding.address, TEST_ADDRESS.create(0));

    let initial = manager.simulate(&binding, "retrieve", &[]).await.unwrap();
    assert_eq!(initial, vec![AbiValue::uint(0)]);

    binding
        .transact(&mut manager, "store", vec![AbiValue::uint(256)], U256::ZERO)
        .await
        .unwrap();
    let updated = manager.simulate(&binding, "retrieve", &[]).await.unwrap();
    assert_eq!(updated, vec![AbiValue::uint(256)]);

    assert!(manager.history().iter().all(|r| r.state() == TransactionState::Confirmed));
    assert_eq!(manager.next_nonce(), Some(2));
});

anvil_test!(test_stale_nonce_is_rejected_by_anvil, async {
    let anvil = AnvilInstance::spawn();
    let artifact = compile_simple_storage();
    let mut manager = anvil_manager(&anvil);
    let (binding, _) = manager.deploy(&artifact, vec![]).await.unwrap();

    let mut stale = anvil_manager(&anvil).with_starting_nonce(0);
    let error = binding
        .transact(&mut stale, "store", vec![AbiValue::uint(1)], U256::ZERO)
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::RejectedTransaction);
    assert!(!stale.history()[0].reached(TransactionState::Pending));
});

anvil_test!(test_chain_id_and_nonce_queries, async {
    let anvil = AnvilInstance::spawn();
    let ledger = EvmRpc::new(&anvil.url).unwrap();
    assert_eq!(ledger.get_chain_id().await.unwrap(), 31337);
    assert_eq!(ledger.get_nonce(&TEST_ADDRESS).await.unwrap(), 0);
    assert!(ledger.get_gas_price().await.unwrap() > 0);
});
