use alloy::primitives::Address;
use error_stack::ResultExt;

use crate::context::Context;
use crate::errors::DeployResult;
use crate::rpc::LedgerClient;

/// Local nonce counter for one sender account.
///
/// The node is asked once, on first use. From then on the counter only moves
/// forward, one step per broadcast attempt, until the caller resyncs it.
#[derive(Clone, Debug)]
pub(crate) struct NonceTracker {
    account: Address,
    next: Option<u64>,
}

impl NonceTracker {
    pub fn new(account: Address) -> Self {
        NonceTracker { account, next: None }
    }

    pub fn with_starting_nonce(account: Address, nonce: u64) -> Self {
        NonceTracker { account, next: Some(nonce) }
    }

    pub fn current(&self) -> Option<u64> {
        self.next
    }

    /// Next nonce to use, seeding from the node's pending count if needed.
    pub async fn peek<L: LedgerClient>(&mut self, ledger: &L, ctx: &Context) -> DeployResult<u64> {
        if let Some(nonce) = self.next {
            return Ok(nonce);
        }
        let nonce = self.fetch(ledger).await?;
        ctx.try_log(|logger| {
            info!(logger, "Seeded nonce {} for {} from {}", nonce, self.account, ledger.endpoint())
        });
        self.next = Some(nonce);
        Ok(nonce)
    }

    /// Marks the peeked nonce as used. Only called right before broadcasting.
    pub fn consume(&mut self) -> Option<u64> {
        let nonce = self.next?;
        self.next = Some(nonce + 1);
        Some(nonce)
    }

    /// Replaces the local counter with the node's pending count.
    pub async fn resync<L: LedgerClient>(
        &mut self,
        ledger: &L,
        ctx: &Context,
    ) -> DeployResult<u64> {
        let nonce = self.fetch(ledger).await?;
        let previous = self.next;
        ctx.try_log(|logger| {
            warn!(logger, "Resynced nonce for {}: {:?} -> {}", self.account, previous, nonce)
        });
        self.next = Some(nonce);
        Ok(nonce)
    }

    async fn fetch<L: LedgerClient>(&self, ledger: &L) -> DeployResult<u64> {
        ledger
            .get_nonce(&self.account)
            .await
            .attach_printable(format!("Fetching starting nonce for {}", self.account))
    }
}
