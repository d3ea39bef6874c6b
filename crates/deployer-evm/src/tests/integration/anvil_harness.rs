use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::compiler::{ArtifactProvider, SolcCompiler};
use crate::config::NetworkConfig;
use crate::context::Context;

use super::super::fixtures::TEST_ADDRESS;

pub const ANVIL_CHAIN_ID: u64 = 31337;

pub fn tools_available() -> bool {
    AnvilInstance::is_available()
        && SolcCompiler::new(None, &Context::empty()).installed_version().is_ok()
}

/// A local anvil process, killed on drop.
pub struct AnvilInstance {
    process: Child,
    pub url: String,
}

impl AnvilInstance {
    pub fn is_available() -> bool {
        Command::new("anvil")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    pub fn spawn() -> Self {
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let process = Command::new("anvil")
            .arg("--port")
            .arg(port.to_string())
            .arg("--chain-id")
            .arg(ANVIL_CHAIN_ID.to_string())
            .arg("--mnemonic")
            .arg("test test test test test test test test test test test junk")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to spawn anvil");

        let deadline = Instant::now() + Duration::from_secs(10);
        while TcpStream::connect(("127.0.0.1", port)).is_err() {
            assert!(Instant::now() < deadline, "anvil did not start on port {}", port);
            std::thread::sleep(Duration::from_millis(50));
        }

        AnvilInstance { process, url: format!("http://127.0.0.1:{}", port) }
    }

    pub fn network_config(&self) -> NetworkConfig {
        let mut config = NetworkConfig::new("anvil", &self.url, ANVIL_CHAIN_ID, TEST_ADDRESS);
        config.poll_interval_ms = 50;
        config.confirmation_timeout_ms = 10_000;
        config
    }
}

impl Drop for AnvilInstance {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

pub fn compile_simple_storage() -> crate::compiler::CompiledArtifact {
    let compiler = SolcCompiler::new(None, &Context::empty());
    let version = compiler.installed_version().unwrap();
    compiler
        .compile(SIMPLE_STORAGE_SOURCE, "SimpleStorage", &version)
        .expect("SimpleStorage should compile")
}

pub const SIMPLE_STORAGE_SOURCE: &str =
    include_str!("../../../../../demos/simple_storage/SimpleStorage.sol");
