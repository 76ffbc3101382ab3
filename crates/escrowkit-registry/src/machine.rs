//! Transaction state machine
//!
//! ```text
//!            accept+accept ──► Fulfilled
//! Ongoing ── cancel+cancel ──► Cancelled
//!            resolve ────────► Fulfilled | Cancelled (by terms)
//! ```
//!
//! One accept and one cancel is a dispute: the transaction stays Ongoing
//! until the broker or the deadline unlocks `resolve`. The functions here
//! mutate a working copy; the registry writes it back only after payout.

use chrono::{DateTime, Utc};
use escrowkit_types::{Action, Outcome, Role, Settlement, Transaction};

/// Effect of recording a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteEffect {
    /// Same vote as before; nothing changed
    Unchanged,
    /// Vote recorded, transaction still Ongoing
    Recorded,
    /// Vote recorded and both parties now agree
    Completed(Outcome),
}

/// Record `action` for the voting party `role`
pub fn record_vote(tx: &mut Transaction, role: Role, action: Action) -> VoteEffect {
    let slot = match role {
        Role::Sender => &mut tx.sender_action,
        Role::Receiver => &mut tx.receiver_action,
        Role::Broker => return VoteEffect::Unchanged,
    };
    if action == Action::None || *slot == action {
        return VoteEffect::Unchanged;
    }
    *slot = action;

    match (tx.sender_action, tx.receiver_action) {
        (Action::Accept, Action::Accept) => VoteEffect::Completed(Outcome::Agreed),
        (Action::Cancel, Action::Cancel) => VoteEffect::Completed(Outcome::Withdrawn),
        _ => VoteEffect::Recorded,
    }
}

/// Apply the terminal transition described by `settlement`
pub fn finalize(tx: &mut Transaction, settlement: Settlement, at: DateTime<Utc>) {
    tx.status = settlement.status;
    tx.settled_at = Some(at);
    tx.settlement = Some(settlement);
}
