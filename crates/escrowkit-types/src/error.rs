//! Error types for EscrowKit
//!
//! Every error is local and leaves the transaction untouched. Callers retry
//! with corrected input or after the state they depend on has changed.

use thiserror::Error;

use crate::{AccountId, TransactionId};

/// Result type for EscrowKit operations
pub type Result<T> = std::result::Result<T, EscrowError>;

/// EscrowKit error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    /// Malformed creation input
    #[error("Invalid parameters: {reason}")]
    InvalidParameters { reason: String },

    /// Zero or overflowing commitment
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Caller is not entitled to the action
    #[error("{caller} is not authorized to {action}")]
    Unauthorized {
        id: Option<TransactionId>,
        caller: AccountId,
        action: String,
    },

    /// Action is illegal in the transaction's current state
    #[error("Transaction {id} cannot proceed: {reason}")]
    InvalidState { id: TransactionId, reason: String },

    /// Unknown transaction id
    #[error("Transaction {id} not found")]
    NotFound { id: TransactionId },

    /// The ledger could not move the value
    #[error("Ledger failure: {reason}")]
    LedgerFailure { reason: String },
}

impl EscrowError {
    pub fn invalid_parameters(reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            reason: reason.into(),
        }
    }

    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            reason: reason.into(),
        }
    }

    pub fn invalid_state(id: TransactionId, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            id,
            reason: reason.into(),
        }
    }

    pub fn unauthorized(
        id: impl Into<Option<TransactionId>>,
        caller: &AccountId,
        action: &str,
    ) -> Self {
        Self::Unauthorized {
            id: id.into(),
            caller: caller.clone(),
            action: action.to_string(),
        }
    }

    /// Short machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParameters { .. } => "invalid_parameters",
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::Unauthorized { .. } => "unauthorized",
            Self::InvalidState { .. } => "invalid_state",
            Self::NotFound { .. } => "not_found",
            Self::LedgerFailure { .. } => "ledger_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EscrowError::invalid_state(TransactionId::new(2), "already settled");
        assert_eq!(err.to_string(), "Transaction tx_2 cannot proceed: already settled");
        assert_eq!(err.code(), "invalid_state");

        let err = EscrowError::unauthorized(TransactionId::new(1), &"mallory".into(), "accept");
        assert_eq!(err.to_string(), "mallory is not authorized to accept");
        assert!(matches!(err, EscrowError::Unauthorized { id: Some(id), .. } if id == TransactionId::new(1)));
    }
}
