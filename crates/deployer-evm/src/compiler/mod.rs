mod cache;
mod solc;

use alloy::json_abi::JsonAbi;
use alloy::primitives::{keccak256, Bytes, B256};

pub use cache::CachedArtifactProvider;
pub use solc::SolcCompiler;

use crate::errors::DeployResult;

/// Turns contract source into deployable bytecode plus its ABI.
///
/// Failures are `Compilation` errors and are fatal to a run.
pub trait ArtifactProvider {
    fn compile(
        &self,
        source: &str,
        contract_name: &str,
        version: &semver::Version,
    ) -> DeployResult<CompiledArtifact>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub contract_name: String,
    pub compiler_version: semver::Version,
    pub bytecode: Bytes,
    pub abi: JsonAbi,
    /// keccak256 of the source text the artifact was built from
    pub source_hash: B256,
    /// Full compiler output, persisted next to cached artifacts
    #[serde(skip)]
    pub raw_output: Option<serde_json::Value>,
}

impl CompiledArtifact {
    pub fn source_hash_of(source: &str) -> B256 {
        keccak256(source.as_bytes())
    }
}

impl<P: ArtifactProvider + ?Sized> ArtifactProvider for &P {
    fn compile(
        &self,
        source: &str,
        contract_name: &str,
        version: &semver::Version,
    ) -> DeployResult<CompiledArtifact> {
        (**self).compile(source, contract_name, version)
    }
}
