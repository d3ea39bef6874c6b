use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use deployer_evm::{AbiValue, Context, LifecycleManager};
use error_stack::ResultExt;

use crate::manifest::{DeployerManifest, DEFAULT_MANIFEST_PATH};
use pipeline::{PipelineError, PipelineResult};

mod env;
pub mod pipeline;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Opts {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Compile, deploy, then store and read back a value
    #[clap(name = "run", bin_name = "run")]
    Run(RunPipeline),
    /// Compile the contract (or load it from the artifact cache)
    #[clap(name = "compile", bin_name = "compile")]
    Compile(CompileContract),
    /// Check that the node's chain id and the signing key match the manifest
    #[clap(name = "check", bin_name = "check")]
    Check(CheckNetwork),
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct RunPipeline {
    /// Path to the manifest (falls back to $DEPLOYER_MANIFEST, then ./deployer.json)
    #[arg(long = "manifest-file-path", short = 'm')]
    pub manifest_path: Option<String>,
    /// Network to deploy to, as named in the manifest (falls back to $DEPLOYER_NETWORK)
    #[arg(long = "network", short = 'n')]
    pub network: Option<String>,
    /// Value passed to store(uint256) once the contract is deployed
    #[arg(long = "store-value", default_value = "256")]
    pub store_value: String,
    /// Print the run report as JSON
    #[arg(long = "output-json", action=ArgAction::SetTrue)]
    pub output_json: bool,
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct CompileContract {
    /// Path to the manifest (falls back to $DEPLOYER_MANIFEST, then ./deployer.json)
    #[arg(long = "manifest-file-path", short = 'm')]
    pub manifest_path: Option<String>,
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct CheckNetwork {
    /// Path to the manifest (falls back to $DEPLOYER_MANIFEST, then ./deployer.json)
    #[arg(long = "manifest-file-path", short = 'm')]
    pub manifest_path: Option<String>,
    /// Network to check, as named in the manifest (falls back to $DEPLOYER_NETWORK)
    #[arg(long = "network", short = 'n')]
    pub network: Option<String>,
}

pub fn main() {
    let logger = hiro_system_kit::log::setup_logger();
    let _guard = hiro_system_kit::log::setup_global_logger(logger.clone());
    let ctx = Context::new(logger);

    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            println!("{}", e);
            process::exit(1);
        }
    };

    env::load_dotenv(&ctx);

    if let Err(e) = hiro_system_kit::nestable_block_on(handle_command(opts, &ctx)) {
        ctx.try_log(|logger| debug!(logger, "{:?}", e));
        eprintln!("{}", format_err!("{}", pipeline::describe_failure(&e)));
        std::thread::sleep(std::time::Duration::from_millis(500));
        process::exit(1);
    }
}

async fn handle_command(opts: Opts, ctx: &Context) -> PipelineResult<()> {
    match opts.command {
        Command::Run(cmd) => handle_run_command(&cmd, ctx).await,
        Command::Compile(cmd) => handle_compile_command(&cmd, ctx),
        Command::Check(cmd) => handle_check_command(&cmd, ctx).await,
    }
}

async fn handle_run_command(cmd: &RunPipeline, ctx: &Context) -> PipelineResult<()> {
    let manifest = load_manifest(cmd.manifest_path.as_deref())?;
    let network = resolve_network(&manifest, cmd.network.as_deref())?;
    let value = AbiValue::parse("uint256", &cmd.store_value)
        .change_context(PipelineError::Config)
        .attach_printable("--store-value must be an unsigned integer")?;

    let artifact = pipeline::compile_artifact(&manifest, ctx)?;
    let mut manager = LifecycleManager::from_config(network, ctx.clone())
        .change_context(PipelineError::Config)?;
    let report = pipeline::deploy_and_interact(&mut manager, &artifact, value).await?;

    if cmd.output_json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report.to_text());
    }
    Ok(())
}

fn handle_compile_command(cmd: &CompileContract, ctx: &Context) -> PipelineResult<()> {
    let manifest = load_manifest(cmd.manifest_path.as_deref())?;
    let artifact = pipeline::compile_artifact(&manifest, ctx)?;

    let methods = artifact.abi.functions().map(|f| f.signature()).collect::<Vec<_>>();
    println!(
        "{} {} with solc {} ({} bytes)",
        green!("Compiled"),
        artifact.contract_name,
        artifact.compiler_version,
        artifact.bytecode.len()
    );
    for method in methods {
        println!("  {}", method);
    }
    Ok(())
}

async fn handle_check_command(cmd: &CheckNetwork, ctx: &Context) -> PipelineResult<()> {
    let manifest = load_manifest(cmd.manifest_path.as_deref())?;
    let network = resolve_network(&manifest, cmd.network.as_deref())?;
    let manager = LifecycleManager::from_config(network, ctx.clone())
        .change_context(PipelineError::Config)?;
    manager.verify_network().await.change_context(PipelineError::Config)?;

    let config = manager.config();
    println!(
        "{} {} (chain {}) as {}",
        green!("Ready"),
        config.name,
        config.chain_id,
        config.sender
    );
    Ok(())
}

fn manifest_location(flag: Option<&str>) -> PathBuf {
    flag.map(str::to_string)
        .or_else(|| env::get_env_var(env::DEPLOYER_MANIFEST_KEY))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST_PATH))
}

fn load_manifest(flag: Option<&str>) -> PipelineResult<DeployerManifest> {
    let path = manifest_location(flag);
    DeployerManifest::from_file(&path).change_context(PipelineError::Config)
}

fn resolve_network(
    manifest: &DeployerManifest,
    flag: Option<&str>,
) -> PipelineResult<deployer_evm::NetworkConfig> {
    let name = flag.map(str::to_string).or_else(|| env::get_env_var(env::DEPLOYER_NETWORK_KEY));
    let network = manifest.network(name.as_deref()).change_context(PipelineError::Config)?;
    network.validate().change_context(PipelineError::Config)?;
    Ok(network.clone())
}
