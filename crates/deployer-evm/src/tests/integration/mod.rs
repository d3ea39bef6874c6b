//! Tests against a real node (anvil) and a real compiler (solc).
//!
//! Each test skips with a message when either binary is missing.

pub mod anvil_harness;

/// Runs an async test body only when `anvil` and `solc` are installed.
macro_rules! anvil_test {
    ($name:ident, $body:expr) => {
        #[tokio::test]
        async fn $name() {
            if !$crate::tests::integration::anvil_harness::tools_available() {
                eprintln!("Skipping {}: anvil and solc are required", stringify!($name));
                eprintln!("    Install with: curl -L https://foundry.paradigm.xyz | bash");
                return;
            }
            $body.await
        }
    };
}

pub(crate) use anvil_test;

mod deployment_tests;
