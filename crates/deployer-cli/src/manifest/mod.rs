use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use deployer_evm::NetworkConfig;
use error_stack::{Report, ResultExt};

pub const DEFAULT_MANIFEST_PATH: &str = "deployer.json";
pub const DEFAULT_SOURCE_PATH: &str = "SimpleStorage.sol";
pub const DEFAULT_CONTRACT_NAME: &str = "SimpleStorage";
pub const DEFAULT_COMPILER_VERSION: &str = "0.6.0";
pub const DEFAULT_CACHE_DIR: &str = "artifacts";
pub const LEGACY_NETWORK_NAME: &str = "default";

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("unable to read manifest {0}")]
    Read(String),
    #[error("malformed manifest {0}")]
    Parse(String),
    #[error("network '{name}' not found (available: {available})")]
    UnknownNetwork { name: String, available: String },
    #[error("several networks configured, pick one with --network (available: {0})")]
    AmbiguousNetwork(String),
    #[error("manifest declares no network")]
    NoNetwork,
}

/// Where the contract comes from and how it is compiled
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerSettings {
    #[serde(default = "default_source_path")]
    pub source_path: PathBuf,
    #[serde(default = "default_contract_name")]
    pub contract_name: String,
    #[serde(default = "default_compiler_version")]
    pub version: semver::Version,
    /// `solc` from `PATH` when absent
    #[serde(default)]
    pub solc_path: Option<PathBuf>,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        CompilerSettings {
            source_path: default_source_path(),
            contract_name: default_contract_name(),
            version: default_compiler_version(),
            solc_path: None,
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_source_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOURCE_PATH)
}

fn default_contract_name() -> String {
    DEFAULT_CONTRACT_NAME.to_string()
}

fn default_compiler_version() -> semver::Version {
    semver::Version::new(0, 6, 0)
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

/// Contents of `deployer.json`.
///
/// Paths inside `compiler` are relative to the directory holding the manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployerManifest {
    #[serde(default)]
    pub compiler: CompilerSettings,
    pub networks: BTreeMap<String, NetworkConfig>,
    #[serde(skip)]
    pub location: Option<PathBuf>,
}

// Older manifests describe a single network with flat keys
#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestFile {
    Full(DeployerManifest),
    Legacy(NetworkConfig),
}

impl DeployerManifest {
    pub fn from_file(path: &Path) -> Result<Self, Report<ManifestError>> {
        let content = fs::read_to_string(path)
            .change_context(ManifestError::Read(path.display().to_string()))?;
        let mut manifest = DeployerManifest::from_json(&content)
            .attach_printable_lazy(|| format!("while reading {}", path.display()))?;
        manifest.location = Some(path.to_path_buf());
        Ok(manifest)
    }

    pub fn from_json(content: &str) -> Result<Self, Report<ManifestError>> {
        let file: ManifestFile = serde_json::from_str(content).map_err(|e| {
            Report::new(ManifestError::Parse(e.to_string()))
        })?;
        let mut manifest = match file {
            ManifestFile::Full(manifest) => manifest,
            ManifestFile::Legacy(network) => DeployerManifest {
                compiler: CompilerSettings::default(),
                networks: BTreeMap::from([(LEGACY_NETWORK_NAME.to_string(), network)]),
                location: None,
            },
        };
        for (name, network) in manifest.networks.iter_mut() {
            if network.name.is_empty() {
                network.name = name.clone();
            }
        }
        Ok(manifest)
    }

    /// Directory that relative paths are resolved against
    pub fn base_dir(&self) -> PathBuf {
        self.location
            .as_ref()
            .and_then(|path| path.parent())
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    pub fn source_path(&self) -> PathBuf {
        self.base_dir().join(&self.compiler.source_path)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.base_dir().join(&self.compiler.cache_dir)
    }

    pub fn solc_path(&self) -> Option<PathBuf> {
        self.compiler.solc_path.as_ref().map(|path| {
            if path.components().count() > 1 {
                self.base_dir().join(path)
            } else {
                path.clone()
            }
        })
    }

    /// Picks the named network. Without a name, a manifest with exactly one
    /// network (or one called `default`) resolves to it.
    pub fn network(&self, name: Option<&str>) -> Result<&NetworkConfig, Report<ManifestError>> {
        let available = || self.networks.keys().cloned().collect::<Vec<_>>().join(", ");
        match name {
            Some(name) => self.networks.get(name).ok_or_else(|| {
                Report::new(ManifestError::UnknownNetwork {
                    name: name.to_string(),
                    available: available(),
                })
            }),
            None => {
                if let Some(network) = self.networks.get(LEGACY_NETWORK_NAME) {
                    return Ok(network);
                }
                let mut networks = self.networks.values();
                match (networks.next(), networks.next()) {
                    (Some(network), None) => Ok(network),
                    (None, _) => Err(Report::new(ManifestError::NoNetwork)),
                    _ => Err(Report::new(ManifestError::AmbiguousNetwork(available()))),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deployer_evm::Address;
    use std::str::FromStr;
    use test_case::test_case;

    const MANIFEST: &str = r#"{
        "compiler": {
            "source_path": "contracts/SimpleStorage.sol",
            "version": "0.8.19",
            "solc_path": "bin/solc"
        },
        "networks": {
            "local": {
                "rpc_url": "http://127.0.0.1:8545",
                "chain_id": 1337,
                "sender": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
            },
            "sepolia": {
                "rpc_url": "https://rpc.sepolia.org",
                "chain_id": 11155111,
                "sender": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
                "private_key_env": "SEPOLIA_PRIVATE_KEY",
                "confirmation_timeout_ms": 300000
            }
        }
    }"#;

    const LEGACY: &str = r#"{
        "ganacheRPCServerUrl": "HTTP://127.0.0.1:7545",
        "chainId": 1337,
        "myAddress": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
    }"#;

    #[test]
    fn test_full_manifest() {
        let manifest = DeployerManifest::from_json(MANIFEST).unwrap();
        assert_eq!(manifest.compiler.contract_name, DEFAULT_CONTRACT_NAME);
        assert_eq!(manifest.compiler.version, semver::Version::new(0, 8, 19));
        assert_eq!(manifest.networks.len(), 2);

        let sepolia = manifest.network(Some("sepolia")).unwrap();
        assert_eq!(sepolia.name, "sepolia");
        assert_eq!(sepolia.chain_id, 11155111);
        assert_eq!(sepolia.private_key_env, "SEPOLIA_PRIVATE_KEY");
        assert_eq!(sepolia.confirmation_timeout_ms, 300_000);
    }

    #[test]
    fn test_legacy_manifest_becomes_default_network() {
        let manifest = DeployerManifest::from_json(LEGACY).unwrap();
        assert_eq!(manifest.compiler, CompilerSettings::default());

        let network = manifest.network(None).unwrap();
        assert_eq!(network.name, LEGACY_NETWORK_NAME);
        assert_eq!(network.rpc_url, "HTTP://127.0.0.1:7545");
        assert_eq!(
            network.sender,
            Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
        );
        assert_eq!(network.private_key_env, "PRIVATE_KEY");
    }

    #[test_case(Some("mainnet") ; "unknown name")]
    #[test_case(None ; "several networks without a name")]
    fn test_network_selection_errors(name: Option<&str>) {
        let manifest = DeployerManifest::from_json(MANIFEST).unwrap();
        let error = manifest.network(name).unwrap_err();
        let message = error.current_context().to_string();
        assert!(message.contains("local, sepolia"), "{}", message);
    }

    #[test]
    fn test_single_network_is_picked_without_a_name() {
        let content = r#"{ "networks": { "anvil": {
            "rpc_url": "http://127.0.0.1:8545",
            "chain_id": 31337,
            "sender": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        } } }"#;
        let manifest = DeployerManifest::from_json(content).unwrap();
        assert_eq!(manifest.network(None).unwrap().name, "anvil");
    }

    #[test]
    fn test_paths_resolve_next_to_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployer.json");
        fs::write(&path, MANIFEST).unwrap();

        let manifest = DeployerManifest::from_file(&path).unwrap();
        assert_eq!(manifest.source_path(), dir.path().join("contracts/SimpleStorage.sol"));
        assert_eq!(manifest.cache_dir(), dir.path().join(DEFAULT_CACHE_DIR));
        assert_eq!(manifest.solc_path(), Some(dir.path().join("bin/solc")));
    }

    #[test]
    fn test_bare_solc_name_is_looked_up_on_path() {
        let mut manifest = DeployerManifest::from_json(LEGACY).unwrap();
        manifest.location = Some(PathBuf::from("/srv/project/deployer.json"));
        manifest.compiler.solc_path = Some(PathBuf::from("solc-0.6.0"));
        assert_eq!(manifest.solc_path(), Some(PathBuf::from("solc-0.6.0")));
    }

    #[test]
    fn test_missing_manifest_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let error = DeployerManifest::from_file(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(error.current_context(), ManifestError::Read(_)));
    }

    #[test]
    fn test_malformed_manifest_is_a_parse_error() {
        let error = DeployerManifest::from_json(r#"{ "networks": 3 }"#).unwrap_err();
        assert!(matches!(error.current_context(), ManifestError::Parse(_)));
    }
}
