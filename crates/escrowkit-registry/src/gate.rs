//! Authorization gate
//!
//! Decides whether a caller may perform an operation on a transaction right
//! now. The gate is pure: it reads the transaction and the current time and
//! never mutates anything.
//!
//! Checks run in a fixed order:
//! 1. a settled transaction rejects everything (`InvalidState`)
//! 2. the caller must hold a role that grants the operation (`Unauthorized`)
//! 3. `resolve` must be eligible at `now` (`InvalidState`)

use std::fmt;

use chrono::{DateTime, Utc};
use escrowkit_types::{AccountId, EscrowError, Result, Role, Transaction};

/// Operations subject to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Commit,
    Accept,
    Cancel,
    Resolve,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit => write!(f, "commit"),
            Self::Accept => write!(f, "accept"),
            Self::Cancel => write!(f, "cancel"),
            Self::Resolve => write!(f, "resolve"),
        }
    }
}

/// Authorize `caller` for `op` on `tx`, returning the caller's role
pub fn authorize(
    tx: &Transaction,
    caller: &AccountId,
    op: Operation,
    now: DateTime<Utc>,
) -> Result<Role> {
    if tx.status.is_terminal() {
        return Err(EscrowError::invalid_state(
            tx.id,
            format!("transaction is already {}", tx.status),
        ));
    }

    let role = tx
        .role_of(caller)
        .ok_or_else(|| EscrowError::unauthorized(tx.id, caller, &op.to_string()))?;

    match (op, role) {
        (Operation::Commit, Role::Sender) => Ok(role),
        (Operation::Accept | Operation::Cancel, Role::Sender | Role::Receiver) => Ok(role),
        (Operation::Resolve, Role::Broker) => {
            if tx.is_past_deadline(now) || tx.is_disputed() {
                Ok(role)
            } else {
                Err(EscrowError::invalid_state(
                    tx.id,
                    "broker may resolve only after the deadline or while the parties disagree",
                ))
            }
        }
        (Operation::Resolve, Role::Sender | Role::Receiver) if tx.broker.is_none() => {
            if tx.is_past_deadline(now) {
                Ok(role)
            } else {
                Err(EscrowError::invalid_state(
                    tx.id,
                    "without a broker, resolve is available only after the deadline",
                ))
            }
        }
        _ => Err(EscrowError::unauthorized(tx.id, caller, &op.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use escrowkit_types::{Action, Amount, Status, Terms, TransactionId};

    fn tx(broker: Option<&str>) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: TransactionId::new(0),
            sender: "alice".into(),
            receiver: "bob".into(),
            broker: broker.map(AccountId::from),
            goal: Amount::new(1000),
            deadline: now + Duration::hours(1),
            terms: Terms::HalfHalf,
            committed: Amount::new(1000),
            status: Status::Ongoing,
            sender_action: Action::None,
            receiver_action: Action::None,
            created_at: now,
            settled_at: None,
            settlement: None,
        }
    }

    fn a(s: &str) -> AccountId {
        AccountId::new(s)
    }

    #[test]
    fn test_parties_may_vote() {
        let t = tx(Some("carol"));
        let now = Utc::now();
        assert_eq!(authorize(&t, &a("alice"), Operation::Accept, now), Ok(Role::Sender));
        assert_eq!(authorize(&t, &a("bob"), Operation::Cancel, now), Ok(Role::Receiver));
        assert_eq!(authorize(&t, &a("alice"), Operation::Commit, now), Ok(Role::Sender));
    }

    #[test]
    fn test_role_restrictions() {
        let t = tx(Some("carol"));
        let now = Utc::now();
        for (caller, op) in [
            ("bob", Operation::Commit),
            ("carol", Operation::Commit),
            ("carol", Operation::Accept),
            ("carol", Operation::Cancel),
            ("mallory", Operation::Accept),
            ("mallory", Operation::Resolve),
            ("alice", Operation::Resolve),
        ] {
            let result = authorize(&t, &a(caller), op, now);
            assert!(
                matches!(result, Err(EscrowError::Unauthorized { .. })),
                "{caller} {op}"
            );
        }
    }

    #[test]
    fn test_broker_resolve_eligibility() {
        let mut t = tx(Some("carol"));
        let before = Utc::now();
        assert!(matches!(
            authorize(&t, &a("carol"), Operation::Resolve, before),
            Err(EscrowError::InvalidState { .. })
        ));

        t.sender_action = Action::Accept;
        t.receiver_action = Action::Cancel;
        assert_eq!(authorize(&t, &a("carol"), Operation::Resolve, before), Ok(Role::Broker));

        t.receiver_action = Action::None;
        let after = t.deadline + Duration::seconds(1);
        assert_eq!(authorize(&t, &a("carol"), Operation::Resolve, after), Ok(Role::Broker));
    }

    #[test]
    fn test_parties_resolve_only_without_broker_after_deadline() {
        let mut t = tx(None);
        t.sender_action = Action::Accept;
        t.receiver_action = Action::Cancel;
        let before = Utc::now();
        let after = t.deadline + Duration::seconds(1);

        assert!(matches!(
            authorize(&t, &a("bob"), Operation::Resolve, before),
            Err(EscrowError::InvalidState { .. })
        ));
        assert_eq!(authorize(&t, &a("bob"), Operation::Resolve, after), Ok(Role::Receiver));
        assert_eq!(authorize(&t, &a("alice"), Operation::Resolve, after), Ok(Role::Sender));
    }

    #[test]
    fn test_settled_transaction_rejects_everyone() {
        let mut t = tx(Some("carol"));
        t.status = Status::Fulfilled;
        let now = Utc::now();
        for caller in ["alice", "bob", "carol", "mallory"] {
            for op in [Operation::Commit, Operation::Accept, Operation::Cancel, Operation::Resolve] {
                assert!(matches!(
                    authorize(&t, &a(caller), op, now),
                    Err(EscrowError::InvalidState { .. })
                ));
            }
        }
    }
}
