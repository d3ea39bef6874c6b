pub const DEFAULT_PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_CONFIRMATION_TIMEOUT_MS: u64 = 120_000;

// Read-only RPC queries are retried this many times on transport failures
pub const MAX_RPC_RETRIES: u64 = 3;
pub const RPC_RETRY_BACKOFF_MS: u64 = 100;

// Gas estimates are padded by this percentage before signing
pub const GAS_LIMIT_BUFFER_PERCENT: u64 = 10;

// solc standard-json settings
pub const SOLIDITY_LANGUAGE: &str = "Solidity";
pub const SOLC_OUTPUT_SELECTION: [&str; 4] = ["abi", "metadata", "evm.bytecode", "evm.sourceMap"];
pub const DEFAULT_SOLC_BINARY: &str = "solc";
pub const ARTIFACT_CACHE_EXTENSION: &str = "json";
pub const COMPILER_OUTPUT_SUFFIX: &str = "solc-output";
