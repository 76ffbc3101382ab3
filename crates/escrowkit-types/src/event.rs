//! Escrow events appended to the event sink
//!
//! Events are written synchronously with each state transition and are never
//! read back by the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Amount, Role, Status, Terms, TransactionId};

/// State transitions observable by external watchers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EscrowEvent {
    /// A transaction was opened
    NewTransaction {
        transaction_id: TransactionId,
        sender: AccountId,
        receiver: AccountId,
        broker: Option<AccountId>,
        goal: Amount,
        deadline: DateTime<Utc>,
        terms: Terms,
    },

    /// The sender committed value
    FundsCommitted {
        transaction_id: TransactionId,
        from: AccountId,
        amount: Amount,
        committed: Amount,
    },

    /// A party voted to accept
    Accepted {
        transaction_id: TransactionId,
        party: AccountId,
        role: Role,
    },

    /// A party voted to cancel
    Cancelled {
        transaction_id: TransactionId,
        party: AccountId,
        role: Role,
    },

    /// Both parties agreed (accept or cancel) and funds were paid out
    Settled {
        transaction_id: TransactionId,
        status: Status,
        sender_share: Amount,
        receiver_share: Amount,
    },

    /// A forced terminal transition was applied and funds were paid out
    Resolved {
        transaction_id: TransactionId,
        by: AccountId,
        status: Status,
        sender_share: Amount,
        receiver_share: Amount,
    },
}

impl EscrowEvent {
    /// The transaction this event belongs to
    pub fn transaction_id(&self) -> TransactionId {
        match self {
            Self::NewTransaction { transaction_id, .. }
            | Self::FundsCommitted { transaction_id, .. }
            | Self::Accepted { transaction_id, .. }
            | Self::Cancelled { transaction_id, .. }
            | Self::Settled { transaction_id, .. }
            | Self::Resolved { transaction_id, .. } => *transaction_id,
        }
    }

    /// Short name of the event kind
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewTransaction { .. } => "NewTransaction",
            Self::FundsCommitted { .. } => "FundsCommitted",
            Self::Accepted { .. } => "Accepted",
            Self::Cancelled { .. } => "Cancelled",
            Self::Settled { .. } => "Settled",
            Self::Resolved { .. } => "Resolved",
        }
    }
}

/// An event together with its position in the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Registry-wide sequence number, starting at 0
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: EscrowEvent,
}
