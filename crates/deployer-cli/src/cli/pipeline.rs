use std::fs;

use deployer_evm::errors::DeployError;
use deployer_evm::{
    AbiValue, Address, ArtifactProvider, CachedArtifactProvider, CompiledArtifact, Context,
    ContractBinding, LedgerClient, LifecycleManager, SolcCompiler, TxHash, U256,
};
use error_stack::{Report, ResultExt};

use crate::manifest::DeployerManifest;

/// Stage of the compile, deploy, interact flow that failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid configuration")]
    Config,
    #[error("compilation failed")]
    Compile,
    #[error("deployment failed")]
    Deploy,
    #[error("contract interaction failed")]
    Interact,
}

pub type PipelineResult<T> = Result<T, Report<PipelineError>>;

/// Outcome of a full run, rendered by the caller
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub network: String,
    pub chain_id: u64,
    pub contract_name: String,
    pub contract_address: Address,
    pub deployment_tx_hash: TxHash,
    pub deployment_block: Option<u64>,
    pub initial_value: String,
    pub store_tx_hash: TxHash,
    pub stored_value: String,
    pub final_value: String,
}

impl RunReport {
    pub fn to_text(&self) -> String {
        let block = self
            .deployment_block
            .map(|block| format!("block {}", block))
            .unwrap_or_else(|| "unknown block".to_string());
        [
            format!(
                "{} {} on {} (chain {})",
                green!("Deployed"),
                self.contract_name,
                self.network,
                self.chain_id
            ),
            format!("  address:  {}", self.contract_address),
            format!("  tx:       {} ({})", self.deployment_tx_hash, block),
            format!("{} retrieve() = {}", green!("Called"), self.initial_value),
            format!("{} store({})", green!("Confirmed"), self.stored_value),
            format!("  tx:       {}", self.store_tx_hash),
            format!("{} retrieve() = {}", green!("Called"), self.final_value),
        ]
        .join("\n")
    }

    pub fn to_json(&self) -> PipelineResult<String> {
        serde_json::to_string_pretty(self)
            .change_context(PipelineError::Interact)
            .attach_printable("unable to serialize run report")
    }
}

/// One line for stderr: failed stage, error kind and the innermost message
pub fn describe_failure(report: &Report<PipelineError>) -> String {
    match report.downcast_ref::<DeployError>() {
        Some(error) => format!("{} [{}]: {}", report.current_context(), error.kind(), error),
        None => report.current_context().to_string(),
    }
}

/// Compiles the manifest's contract, going through the artifact cache.
pub fn compile_artifact(
    manifest: &DeployerManifest,
    ctx: &Context,
) -> PipelineResult<CompiledArtifact> {
    let source_path = manifest.source_path();
    let source = fs::read_to_string(&source_path)
        .change_context(PipelineError::Config)
        .attach_printable_lazy(|| format!("unable to read {}", source_path.display()))?;

    let compiler = SolcCompiler::new(manifest.solc_path(), ctx);
    let provider = CachedArtifactProvider::new(compiler, manifest.cache_dir(), ctx);
    provider
        .compile(&source, &manifest.compiler.contract_name, &manifest.compiler.version)
        .change_context(PipelineError::Compile)
}

/// Deploys `artifact`, reads the stored value, stores `value` and reads it
/// back. The manager is expected to already be connected.
pub async fn deploy_and_interact<L: LedgerClient>(
    manager: &mut LifecycleManager<L>,
    artifact: &CompiledArtifact,
    value: AbiValue,
) -> PipelineResult<RunReport> {
    manager.verify_network().await.change_context(PipelineError::Config)?;

    let (binding, receipt) =
        manager.deploy(artifact, vec![]).await.change_context(PipelineError::Deploy)?;

    let initial_value = retrieve(manager, &binding).await?;
    let stored_value = value.to_string();
    let store_receipt = binding
        .transact(manager, "store", vec![value], U256::ZERO)
        .await
        .change_context(PipelineError::Interact)?;
    let final_value = retrieve(manager, &binding).await?;

    let config = manager.config();
    Ok(RunReport {
        network: config.name.clone(),
        chain_id: config.chain_id,
        contract_name: artifact.contract_name.clone(),
        contract_address: binding.address,
        deployment_tx_hash: receipt.transaction_hash,
        deployment_block: receipt.block_number,
        initial_value,
        store_tx_hash: store_receipt.transaction_hash,
        stored_value,
        final_value,
    })
}

async fn retrieve<L: LedgerClient>(
    manager: &LifecycleManager<L>,
    binding: &ContractBinding,
) -> PipelineResult<String> {
    let values = manager
        .simulate(binding, "retrieve", &[])
        .await
        .change_context(PipelineError::Interact)?;
    stored_value(&values)
}

/// `retrieve()` returns exactly one uint256.
fn stored_value(values: &[AbiValue]) -> PipelineResult<String> {
    match values {
        [value] => value.as_uint().map(|value| value.to_string()),
        _ => None,
    }
    .ok_or_else(|| {
        Report::new(PipelineError::Interact)
            .attach_printable(format!("retrieve() returned {:?}, expected one uint256", values))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use deployer_evm::errors::ErrorKind;
    use std::str::FromStr;

    fn report() -> RunReport {
        RunReport {
            network: "local".to_string(),
            chain_id: 1337,
            contract_name: "SimpleStorage".to_string(),
            contract_address: Address::from_str("0x5FbDB2315678afecb367f032d93F642f64180aa3")
                .unwrap(),
            deployment_tx_hash: TxHash::repeat_byte(0x11),
            deployment_block: Some(1),
            initial_value: "0".to_string(),
            store_tx_hash: TxHash::repeat_byte(0x22),
            stored_value: "256".to_string(),
            final_value: "256".to_string(),
        }
    }

    #[test]
    fn test_json_report_is_structured() {
        let json: serde_json::Value = serde_json::from_str(&report().to_json().unwrap()).unwrap();
        assert_eq!(json["network"], "local");
        assert_eq!(json["chain_id"], 1337);
        assert_eq!(json["deployment_block"], 1);
        assert_eq!(json["initial_value"], "0");
        assert_eq!(json["final_value"], "256");
        assert_eq!(
            json["contract_address"].as_str().unwrap().to_lowercase(),
            "0x5fbdb2315678afecb367f032d93f642f64180aa3"
        );
    }

    #[test]
    fn test_text_report_lists_every_step() {
        let text = report().to_text();
        assert!(text.contains("SimpleStorage on local (chain 1337)"));
        assert!(text.contains("block 1"));
        assert!(text.contains("retrieve() = 0"));
        assert!(text.contains("store(256)"));
        assert!(text.contains("retrieve() = 256"));
    }

    #[test]
    fn test_failure_names_stage_and_kind() {
        let error = Report::new(DeployError::RejectedTransaction("nonce too low".into()))
            .change_context(PipelineError::Interact);
        let line = describe_failure(&error);
        assert!(line.starts_with("contract interaction failed"), "{}", line);
        assert!(line.contains(&ErrorKind::RejectedTransaction.to_string()), "{}", line);
        assert!(line.contains("nonce too low"), "{}", line);
    }

    #[test]
    fn test_stored_value_is_a_single_uint() {
        assert_eq!(stored_value(&[AbiValue::Uint(U256::from(256))]).unwrap(), "256");

        let unexpected = [
            vec![],
            vec![AbiValue::Bool(true)],
            vec![AbiValue::uint(1), AbiValue::uint(2)],
        ];
        for values in unexpected {
            let error = stored_value(&values).unwrap_err();
            assert_eq!(*error.current_context(), PipelineError::Interact);
        }
    }

    #[test]
    fn test_failure_without_deploy_error() {
        let error = Report::new(PipelineError::Config);
        assert_eq!(describe_failure(&error), "invalid configuration");
    }

    #[test]
    fn test_missing_source_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployer.json");
        fs::write(
            &path,
            r#"{ "networks": { "local": {
                "rpc_url": "http://127.0.0.1:8545",
                "chain_id": 1337,
                "sender": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
            } } }"#,
        )
        .unwrap();
        let manifest = DeployerManifest::from_file(&path).unwrap();

        let error = compile_artifact(&manifest, &Context::empty()).unwrap_err();
        assert_eq!(*error.current_context(), PipelineError::Config);
    }
}
