use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use alloy::hex;
use alloy::json_abi::JsonAbi;
use alloy::primitives::Bytes;
use error_stack::{Report, ResultExt};
use serde_json::{json, Value as JsonValue};

use super::{ArtifactProvider, CompiledArtifact};
use crate::constants::{DEFAULT_SOLC_BINARY, SOLC_OUTPUT_SELECTION, SOLIDITY_LANGUAGE};
use crate::context::Context;
use crate::errors::{DeployError, DeployResult};

/// Runs a local `solc` binary in `--standard-json` mode.
#[derive(Clone, Debug)]
pub struct SolcCompiler {
    pub solc_path: PathBuf,
    ctx: Context,
}

#[derive(Debug, Deserialize)]
struct StandardJsonOutput {
    #[serde(default)]
    errors: Vec<SolcDiagnostic>,
    #[serde(default)]
    contracts: BTreeMap<String, BTreeMap<String, SolcContract>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolcDiagnostic {
    severity: String,
    message: String,
    formatted_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SolcContract {
    abi: JsonAbi,
    evm: SolcEvmOutput,
}

#[derive(Debug, Deserialize)]
struct SolcEvmOutput {
    bytecode: SolcBytecode,
}

#[derive(Debug, Deserialize)]
struct SolcBytecode {
    object: String,
}

impl SolcCompiler {
    pub fn new(solc_path: Option<PathBuf>, ctx: &Context) -> Self {
        SolcCompiler {
            solc_path: solc_path.unwrap_or_else(|| PathBuf::from(DEFAULT_SOLC_BINARY)),
            ctx: ctx.clone(),
        }
    }

    /// Version reported by `solc --version`, without the commit suffix.
    pub fn installed_version(&self) -> DeployResult<semver::Version> {
        let output = Command::new(&self.solc_path).arg("--version").output().map_err(|e| {
            Report::new(DeployError::Compilation(format!(
                "failed to run {}: {}",
                self.solc_path.display(),
                e
            )))
        })?;
        parse_solc_version(&String::from_utf8_lossy(&output.stdout))
    }

    fn run_standard_json(&self, input: &JsonValue) -> DeployResult<JsonValue> {
        let mut child = Command::new(&self.solc_path)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Report::new(DeployError::Compilation(format!(
                    "failed to run {}: {}",
                    self.solc_path.display(),
                    e
                )))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.to_string().as_bytes()).map_err(|e| {
                Report::new(DeployError::Compilation(format!("failed to write solc input: {}", e)))
            })?;
        }

        let output = child.wait_with_output().map_err(|e| {
            Report::new(DeployError::Compilation(format!("solc did not complete: {}", e)))
        })?;
        if !output.status.success() {
            return Err(Report::new(DeployError::Compilation(format!(
                "solc exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            Report::new(DeployError::Compilation(format!("unreadable solc output: {}", e)))
        })
    }
}

impl ArtifactProvider for SolcCompiler {
    fn compile(
        &self,
        source: &str,
        contract_name: &str,
        version: &semver::Version,
    ) -> DeployResult<CompiledArtifact> {
        let installed = self.installed_version()?;
        if &installed != version {
            return Err(Report::new(DeployError::Compilation(format!(
                "{} is solc {} but {} was requested",
                self.solc_path.display(),
                installed,
                version
            ))));
        }

        let source_name = format!("{}.sol", contract_name);
        self.ctx.try_log(|logger| {
            info!(logger, "Compiling {} with solc {}", source_name, installed)
        });

        let input = standard_json_input(&source_name, source);
        let raw_output = self
            .run_standard_json(&input)
            .attach_printable(format!("Compiling {}", source_name))?;
        let artifact =
            extract_artifact(raw_output, &source_name, contract_name, version, source)?;

        self.ctx.try_log(|logger| {
            info!(
                logger,
                "Compiled {} ({} bytes of bytecode)",
                contract_name,
                artifact.bytecode.len()
            )
        });
        Ok(artifact)
    }
}

fn standard_json_input(source_name: &str, source: &str) -> JsonValue {
    json!({
        "language": SOLIDITY_LANGUAGE,
        "sources": { source_name: { "content": source } },
        "settings": {
            "outputSelection": { "*": { "*": SOLC_OUTPUT_SELECTION } }
        }
    })
}

fn parse_solc_version(version_output: &str) -> DeployResult<semver::Version> {
    let raw = version_output
        .lines()
        .find_map(|line| line.trim().strip_prefix("Version:"))
        .ok_or_else(|| {
            Report::new(DeployError::Compilation(format!(
                "unexpected `solc --version` output: {}",
                version_output.trim()
            )))
        })?;
    let version = raw.trim().split('+').next().unwrap_or_default();
    semver::Version::parse(version).map_err(|e| {
        Report::new(DeployError::Compilation(format!(
            "invalid solc version '{}': {}",
            version, e
        )))
    })
}

fn extract_artifact(
    raw_output: JsonValue,
    source_name: &str,
    contract_name: &str,
    version: &semver::Version,
    source: &str,
) -> DeployResult<CompiledArtifact> {
    let output: StandardJsonOutput = serde_json::from_value(raw_output.clone()).map_err(|e| {
        Report::new(DeployError::Compilation(format!("unexpected solc output shape: {}", e)))
    })?;

    let errors: Vec<&SolcDiagnostic> =
        output.errors.iter().filter(|d| d.severity.eq_ignore_ascii_case("error")).collect();
    if let Some(first) = errors.first() {
        let mut report = Report::new(DeployError::Compilation(first.message.clone()));
        for diagnostic in &errors {
            report = report.attach_printable(
                diagnostic.formatted_message.clone().unwrap_or_else(|| diagnostic.message.clone()),
            );
        }
        return Err(report);
    }

    let contract = output
        .contracts
        .get(source_name)
        .and_then(|contracts| contracts.get(contract_name))
        .ok_or_else(|| {
            Report::new(DeployError::Compilation(format!(
                "contract {} not found in {}",
                contract_name, source_name
            )))
        })?;

    let bytecode = hex::decode(contract.evm.bytecode.object.trim()).map_err(|e| {
        Report::new(DeployError::Compilation(format!("bytecode is not valid hex: {}", e)))
    })?;

    Ok(CompiledArtifact {
        contract_name: contract_name.to_string(),
        compiler_version: version.clone(),
        bytecode: Bytes::from(bytecode),
        abi: contract.abi.clone(),
        source_hash: CompiledArtifact::source_hash_of(source),
        raw_output: Some(raw_output),
    })
}
