use std::fmt;

use alloy::primitives::TxHash;

/// Per-transaction state machine:
/// `Built -> Signed -> Broadcast -> Pending -> Confirmed | Failed | TimedOut`.
///
/// `Failed` can also follow `Built` (signing failed) or `Broadcast` (the node
/// refused the raw transaction). A broadcast that failed in transit stays at
/// `Broadcast` until re-polled. A `TimedOut` transaction may later move to
/// `Confirmed` or `Failed` when the caller re-polls it by hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
    Built,
    Signed,
    Broadcast,
    Pending,
    Confirmed,
    Failed,
    TimedOut,
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionState::Confirmed | TransactionState::Failed)
    }

    pub fn can_advance_to(&self, next: TransactionState) -> bool {
        use TransactionState::*;
        matches!(
            (self, next),
            (Built, Signed)
                | (Built, Failed)
                | (Signed, Broadcast)
                | (Broadcast, Pending)
                | (Broadcast, Failed)
                | (Pending, Confirmed)
                | (Pending, Failed)
                | (Pending, TimedOut)
                | (TimedOut, Confirmed)
                | (TimedOut, Failed)
        )
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Built => "BUILT",
            TransactionState::Signed => "SIGNED",
            TransactionState::Broadcast => "BROADCAST",
            TransactionState::Pending => "PENDING",
            TransactionState::Confirmed => "CONFIRMED",
            TransactionState::Failed => "FAILED",
            TransactionState::TimedOut => "TIMED_OUT",
        };
        write!(f, "{}", name)
    }
}

/// What the manager remembers about one submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub label: String,
    pub nonce: u64,
    pub tx_hash: Option<TxHash>,
    pub transitions: Vec<TransactionState>,
}

impl TransactionRecord {
    pub(crate) fn new(label: String, nonce: u64) -> Self {
        let transitions = vec![TransactionState::Built];
        TransactionRecord { label, nonce, tx_hash: None, transitions }
    }

    pub fn state(&self) -> TransactionState {
        *self.transitions.last().unwrap_or(&TransactionState::Built)
    }

    pub fn reached(&self, state: TransactionState) -> bool {
        self.transitions.contains(&state)
    }

    /// Appends `next` if it is a legal successor of the current state.
    pub(crate) fn advance(&mut self, next: TransactionState) -> bool {
        if !self.state().can_advance_to(next) {
            return false;
        }
        self.transitions.push(next);
        true
    }
}
