use dotenvy::dotenv;

pub const DEPLOYER_MANIFEST_KEY: &str = "DEPLOYER_MANIFEST";
pub const DEPLOYER_NETWORK_KEY: &str = "DEPLOYER_NETWORK";

/// Loads `.env` from the working directory (or a parent) into the process
/// environment. A missing file is not an error.
pub fn load_dotenv(ctx: &deployer_evm::Context) {
    match dotenv() {
        Ok(path) => ctx.try_log(|logger| debug!(logger, "Loaded {}", path.display())),
        Err(e) if e.not_found() => {}
        Err(e) => ctx.try_log(|logger| warn!(logger, "Unable to load .env file: {}", e)),
    }
}

pub fn get_env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
