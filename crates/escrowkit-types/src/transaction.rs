//! Escrow transaction types
//!
//! A transaction is one agreement between a sender, a receiver and an
//! optional broker over value committed by the sender.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AccountId, Amount, TransactionId};

/// How committed funds are split on settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terms {
    /// Everything goes back to the sender
    BackToSender,
    /// Everything goes to the receiver
    BackToReceiver,
    /// Split in two, the odd unit to the receiver
    HalfHalf,
}

impl fmt::Display for Terms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackToSender => write!(f, "back_to_sender"),
            Self::BackToReceiver => write!(f, "back_to_receiver"),
            Self::HalfHalf => write!(f, "half_half"),
        }
    }
}

/// A party's recorded vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[default]
    None,
    Accept,
    Cancel,
}

/// Lifecycle status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Ongoing,
    Fulfilled,
    Cancelled,
}

impl Status {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Fulfilled | Self::Cancelled)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ongoing => write!(f, "ongoing"),
            Self::Fulfilled => write!(f, "fulfilled"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The role an account plays in a given transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Sender,
    Receiver,
    Broker,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => write!(f, "sender"),
            Self::Receiver => write!(f, "receiver"),
            Self::Broker => write!(f, "broker"),
        }
    }
}

/// How a transaction reached its terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Sender and receiver both accepted
    Agreed,
    /// Sender and receiver both cancelled
    Withdrawn,
    /// Forced by `resolve`
    Arbitrated,
}

/// The payout computed for a terminal transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub outcome: Outcome,
    pub status: Status,
    pub sender_share: Amount,
    pub receiver_share: Amount,
}

impl Settlement {
    /// Sum of both shares
    pub fn total(&self) -> Amount {
        Amount(self.sender_share.0 + self.receiver_share.0)
    }
}

/// Request to open a new escrow transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransaction {
    pub sender: AccountId,
    pub receiver: AccountId,
    pub broker: Option<AccountId>,
    pub goal: Amount,
    pub deadline: DateTime<Utc>,
    pub terms: Terms,
    /// Value pre-funded by the sender at creation (may be zero)
    #[serde(default)]
    pub initial_value: Amount,
}

impl CreateTransaction {
    pub fn new(
        sender: impl Into<AccountId>,
        receiver: impl Into<AccountId>,
        goal: Amount,
        deadline: DateTime<Utc>,
        terms: Terms,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            broker: None,
            goal,
            deadline,
            terms,
            initial_value: Amount::zero(),
        }
    }

    pub fn with_broker(mut self, broker: impl Into<AccountId>) -> Self {
        self.broker = Some(broker.into());
        self
    }

    pub fn with_initial_value(mut self, value: Amount) -> Self {
        self.initial_value = value;
        self
    }
}

/// An escrow transaction record
///
/// Terminal transactions stay in the store as historical records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub sender: AccountId,
    pub receiver: AccountId,
    pub broker: Option<AccountId>,
    pub goal: Amount,
    pub deadline: DateTime<Utc>,
    pub terms: Terms,
    pub committed: Amount,
    pub status: Status,
    pub sender_action: Action,
    pub receiver_action: Action,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    pub settlement: Option<Settlement>,
}

impl Transaction {
    /// Role of `account` in this transaction, if any
    pub fn role_of(&self, account: &AccountId) -> Option<Role> {
        if account == &self.sender {
            Some(Role::Sender)
        } else if account == &self.receiver {
            Some(Role::Receiver)
        } else if self.broker.as_ref() == Some(account) {
            Some(Role::Broker)
        } else {
            None
        }
    }

    /// Recorded vote of a voting party; the broker never votes
    pub fn action_of(&self, role: Role) -> Action {
        match role {
            Role::Sender => self.sender_action,
            Role::Receiver => self.receiver_action,
            Role::Broker => Action::None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `committed` has reached `goal`
    pub fn is_funded(&self) -> bool {
        self.committed >= self.goal
    }

    /// Value still missing to reach `goal`
    pub fn remaining_to_goal(&self) -> Amount {
        self.goal.checked_sub(self.committed).unwrap_or_default()
    }

    /// One side accepted while the other cancelled
    pub fn is_disputed(&self) -> bool {
        matches!(
            (self.sender_action, self.receiver_action),
            (Action::Accept, Action::Cancel) | (Action::Cancel, Action::Accept)
        )
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }
}
