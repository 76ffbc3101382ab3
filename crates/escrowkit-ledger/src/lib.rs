//! EscrowKit Ledger - the value-moving collaborator of the escrow registry
//!
//! The registry never touches balances itself. It asks an [`EscrowLedger`] to
//! pull commitments into custody and to pay shares out of custody. This crate
//! defines that contract and ships an in-memory double-entry implementation.
//!
//! The in-memory ledger is:
//! - Custody-scoped (escrowed value sits in one custody account)
//! - Double-entry (every debit has a matching credit)
//! - Append-only (entries are never edited; mistakes are reversed)
//! - Transaction-linked (escrow entries carry the transaction id)
//!
//! # Invariants
//!
//! 1. No negative balances
//! 2. Every entry has a reason
//! 3. A multi-leg payout applies completely or not at all

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use escrowkit_types::{AccountId, Amount, EscrowError, TransactionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default name of the custody account
pub const DEFAULT_CUSTODY_ACCOUNT: &str = "escrow_custody";

/// Errors that can occur in ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient balance in {account}: have {available}, need {required}")]
    InsufficientBalance {
        account: String,
        available: u64,
        required: u64,
    },

    #[error("Account {account} is frozen")]
    AccountFrozen { account: String },

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Entry not found: {entry_id}")]
    EntryNotFound { entry_id: String },

    #[error("Entry {entry_id} has already been reversed")]
    AlreadyReversed { entry_id: String },
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<LedgerError> for EscrowError {
    fn from(e: LedgerError) -> Self {
        EscrowError::LedgerFailure {
            reason: e.to_string(),
        }
    }
}

/// Unique identifier for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new() -> Self {
        Self(format!("entry_{}", Uuid::new_v4()))
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Credit (increase) to an account
    Credit,
    /// Debit (decrease) from an account
    Debit,
}

/// Reason for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryReason {
    /// External funding of an account
    Deposit { memo: String },
    /// Commitment pulled into custody
    EscrowLock { transaction_id: TransactionId },
    /// Share paid out of custody
    EscrowRelease { transaction_id: TransactionId },
    /// Compensation of an earlier transfer
    Reversal { reversed_entry: EntryId },
}

/// A single ledger entry (one side of a double-entry)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub account: AccountId,
    pub entry_type: EntryType,
    pub amount: Amount,
    pub balance_after: Amount,
    pub reason: EntryReason,
    pub transaction_id: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
}

/// One leg of a payout out of custody
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub payee: AccountId,
    pub amount: Amount,
}

impl Payout {
    pub fn new(payee: AccountId, amount: Amount) -> Self {
        Self { payee, amount }
    }
}

/// The ledger contract the escrow registry depends on
///
/// `transfer_in` and `transfer_out` are the primitives. `payout` moves
/// several shares as a unit: the provided implementation compensates
/// already-applied legs with `reverse` when a later leg fails, and
/// implementations that can apply a batch atomically should override it.
#[async_trait]
pub trait EscrowLedger: Send + Sync {
    /// Move `amount` from `payer` into custody for `transaction_id`
    async fn transfer_in(
        &self,
        transaction_id: TransactionId,
        payer: &AccountId,
        amount: Amount,
    ) -> Result<EntryId>;

    /// Move `amount` out of custody to `payee` for `transaction_id`
    async fn transfer_out(
        &self,
        transaction_id: TransactionId,
        payee: &AccountId,
        amount: Amount,
    ) -> Result<EntryId>;

    /// Undo a transfer previously returned by `transfer_in` or `transfer_out`
    async fn reverse(&self, entry_id: &EntryId) -> Result<()>;

    /// Pay every non-zero leg, or none of them
    async fn payout(
        &self,
        transaction_id: TransactionId,
        payouts: &[Payout],
    ) -> Result<Vec<EntryId>> {
        let mut applied: Vec<EntryId> = Vec::new();

        for payout in payouts.iter().filter(|p| !p.amount.is_zero()) {
            match self
                .transfer_out(transaction_id, &payout.payee, payout.amount)
                .await
            {
                Ok(entry_id) => applied.push(entry_id),
                Err(e) => {
                    for entry_id in applied.iter().rev() {
                        if let Err(rollback_err) = self.reverse(entry_id).await {
                            warn!(
                                tx = %transaction_id,
                                entry = %entry_id,
                                error = %rollback_err,
                                "Payout rollback failed"
                            );
                        }
                    }
                    warn!(tx = %transaction_id, error = %e, "Payout rolled back");
                    return Err(e);
                }
            }
        }

        Ok(applied)
    }
}

/// A recorded movement between two accounts, kept for reversal
#[derive(Debug, Clone)]
struct Transfer {
    from: AccountId,
    to: AccountId,
    amount: Amount,
    transaction_id: Option<TransactionId>,
    reversed: bool,
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<AccountId, Amount>,
    entries: Vec<LedgerEntry>,
    frozen: HashSet<AccountId>,
    transfers: HashMap<EntryId, Transfer>,
}

impl LedgerState {
    fn balance(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn check_not_frozen(&self, account: &AccountId) -> Result<()> {
        if self.frozen.contains(account) {
            return Err(LedgerError::AccountFrozen {
                account: account.0.clone(),
            });
        }
        Ok(())
    }

    fn check_move(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
        enforce_freeze: bool,
    ) -> Result<()> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount {
                message: "Amount must be greater than zero".to_string(),
            });
        }
        if enforce_freeze {
            self.check_not_frozen(from)?;
            self.check_not_frozen(to)?;
        }

        let available = self.balance(from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: from.0.clone(),
                available: available.0,
                required: amount.0,
            });
        }
        if from != to && self.balance(to).checked_add(amount).is_none() {
            return Err(LedgerError::InvalidAmount {
                message: "Balance overflow".to_string(),
            });
        }
        Ok(())
    }

    fn push_entry(
        &mut self,
        account: &AccountId,
        entry_type: EntryType,
        amount: Amount,
        reason: EntryReason,
        transaction_id: Option<TransactionId>,
    ) -> EntryId {
        let current = self.balance(account);
        let balance_after = match entry_type {
            EntryType::Credit => Amount(current.0 + amount.0),
            EntryType::Debit => Amount(current.0 - amount.0),
        };
        self.balances.insert(account.clone(), balance_after);

        let entry = LedgerEntry {
            entry_id: EntryId::new(),
            account: account.clone(),
            entry_type,
            amount,
            balance_after,
            reason,
            transaction_id,
            created_at: Utc::now(),
        };
        let entry_id = entry.entry_id.clone();
        self.entries.push(entry);
        entry_id
    }

    /// Apply a movement already validated by `check_move`
    ///
    /// Returns the credit-side entry.
    fn apply_move(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
        reason: EntryReason,
        transaction_id: Option<TransactionId>,
    ) -> EntryId {
        self.push_entry(from, EntryType::Debit, amount, reason.clone(), transaction_id);
        self.push_entry(to, EntryType::Credit, amount, reason, transaction_id)
    }

    /// Apply a validated escrow movement and remember it for `reverse`
    ///
    /// The credit-side entry identifies the transfer.
    fn apply_transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
        reason: EntryReason,
        transaction_id: Option<TransactionId>,
    ) -> EntryId {
        let entry_id = self.apply_move(from, to, amount, reason, transaction_id);
        self.transfers.insert(
            entry_id.clone(),
            Transfer {
                from: from.clone(),
                to: to.clone(),
                amount,
                transaction_id,
                reversed: false,
            },
        );
        entry_id
    }
}

/// In-memory double-entry ledger
///
/// Thread-safe and cheap to clone; clones share state.
#[derive(Clone)]
pub struct InMemoryLedger {
    custody: AccountId,
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    /// Create a new ledger with the default custody account
    pub fn new() -> Self {
        Self::with_custody(AccountId::new(DEFAULT_CUSTODY_ACCOUNT))
    }

    /// Create a new ledger holding escrowed value in `custody`
    pub fn with_custody(custody: AccountId) -> Self {
        Self {
            custody,
            state: Arc::new(RwLock::new(LedgerState::default())),
        }
    }

    /// The account holding escrowed value
    pub fn custody_account(&self) -> &AccountId {
        &self.custody
    }

    /// Get the balance of an account
    pub async fn balance(&self, account: &AccountId) -> Amount {
        self.state.read().await.balance(account)
    }

    /// Sum of all balances, custody included
    pub async fn total_balance(&self) -> Amount {
        self.state.read().await.balances.values().copied().sum()
    }

    /// Fund an account from outside the ledger
    ///
    /// Returns the new balance and the entry ID.
    pub async fn deposit(
        &self,
        account: &AccountId,
        amount: Amount,
        memo: impl Into<String>,
    ) -> Result<(Amount, EntryId)> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount {
                message: "Amount must be greater than zero".to_string(),
            });
        }

        let mut state = self.state.write().await;
        state.check_not_frozen(account)?;
        if state.balance(account).checked_add(amount).is_none() {
            return Err(LedgerError::InvalidAmount {
                message: "Balance overflow".to_string(),
            });
        }

        let entry_id = state.push_entry(
            account,
            EntryType::Credit,
            amount,
            EntryReason::Deposit { memo: memo.into() },
            None,
        );
        Ok((state.balance(account), entry_id))
    }

    /// Refuse every debit and credit touching `account`
    pub async fn freeze(&self, account: &AccountId) {
        self.state.write().await.frozen.insert(account.clone());
    }

    pub async fn unfreeze(&self, account: &AccountId) {
        self.state.write().await.frozen.remove(account);
    }

    pub async fn is_frozen(&self, account: &AccountId) -> bool {
        self.state.read().await.frozen.contains(account)
    }

    /// Get all entries for an account
    pub async fn account_entries(&self, account: &AccountId) -> Vec<LedgerEntry> {
        let state = self.state.read().await;
        state
            .entries
            .iter()
            .filter(|e| &e.account == account)
            .cloned()
            .collect()
    }

    /// Get all entries linked to an escrow transaction
    pub async fn transaction_entries(&self, transaction_id: TransactionId) -> Vec<LedgerEntry> {
        let state = self.state.read().await;
        state
            .entries
            .iter()
            .filter(|e| e.transaction_id == Some(transaction_id))
            .cloned()
            .collect()
    }

    /// Net value moved into custody for a transaction (locks minus releases)
    pub async fn escrowed_for(&self, transaction_id: TransactionId) -> Amount {
        let state = self.state.read().await;
        let (mut credited, mut debited) = (0u64, 0u64);
        for transfer in state.transfers.values() {
            if transfer.reversed || transfer.transaction_id != Some(transaction_id) {
                continue;
            }
            if transfer.to == self.custody {
                credited += transfer.amount.0;
            }
            if transfer.from == self.custody {
                debited += transfer.amount.0;
            }
        }
        Amount(credited.saturating_sub(debited))
    }

    /// Get the total number of entries
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entries.len()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EscrowLedger for InMemoryLedger {
    async fn transfer_in(
        &self,
        transaction_id: TransactionId,
        payer: &AccountId,
        amount: Amount,
    ) -> Result<EntryId> {
        let mut state = self.state.write().await;
        state.check_move(payer, &self.custody, amount, true)?;
        let entry_id = state.apply_transfer(
            payer,
            &self.custody,
            amount,
            EntryReason::EscrowLock { transaction_id },
            Some(transaction_id),
        );
        debug!(tx = %transaction_id, payer = %payer, amount = %amount, "Escrow lock recorded");
        Ok(entry_id)
    }

    async fn transfer_out(
        &self,
        transaction_id: TransactionId,
        payee: &AccountId,
        amount: Amount,
    ) -> Result<EntryId> {
        let mut state = self.state.write().await;
        state.check_move(&self.custody, payee, amount, true)?;
        let entry_id = state.apply_transfer(
            &self.custody,
            payee,
            amount,
            EntryReason::EscrowRelease { transaction_id },
            Some(transaction_id),
        );
        debug!(tx = %transaction_id, payee = %payee, amount = %amount, "Escrow release recorded");
        Ok(entry_id)
    }

    async fn reverse(&self, entry_id: &EntryId) -> Result<()> {
        let mut state = self.state.write().await;
        let transfer = state
            .transfers
            .get(entry_id)
            .cloned()
            .ok_or_else(|| LedgerError::EntryNotFound {
                entry_id: entry_id.0.clone(),
            })?;

        if transfer.reversed {
            return Err(LedgerError::AlreadyReversed {
                entry_id: entry_id.0.clone(),
            });
        }

        // Compensations ignore freezes; only the balance must cover them.
        state.check_move(&transfer.to, &transfer.from, transfer.amount, false)?;
        state.apply_move(
            &transfer.to,
            &transfer.from,
            transfer.amount,
            EntryReason::Reversal {
                reversed_entry: entry_id.clone(),
            },
            transfer.transaction_id,
        );
        if let Some(t) = state.transfers.get_mut(entry_id) {
            t.reversed = true;
        }

        warn!(entry = %entry_id, amount = %transfer.amount, "Transfer reversed");
        Ok(())
    }

    async fn payout(
        &self,
        transaction_id: TransactionId,
        payouts: &[Payout],
    ) -> Result<Vec<EntryId>> {
        let legs: Vec<&Payout> = payouts.iter().filter(|p| !p.amount.is_zero()).collect();
        let mut state = self.state.write().await;

        // Validate the whole batch before touching any balance.
        let mut total = Amount::zero();
        let mut incoming: HashMap<&AccountId, Amount> = HashMap::new();
        for leg in &legs {
            state.check_not_frozen(&leg.payee)?;
            total = total
                .checked_add(leg.amount)
                .ok_or_else(|| LedgerError::InvalidAmount {
                    message: "Payout total overflow".to_string(),
                })?;
            let acc = incoming.entry(&leg.payee).or_default();
            *acc = acc
                .checked_add(leg.amount)
                .ok_or_else(|| LedgerError::InvalidAmount {
                    message: "Payout total overflow".to_string(),
                })?;
        }
        if !total.is_zero() {
            state.check_not_frozen(&self.custody)?;
        }

        let available = state.balance(&self.custody);
        if available < total {
            return Err(LedgerError::InsufficientBalance {
                account: self.custody.0.clone(),
                available: available.0,
                required: total.0,
            });
        }
        for (payee, amount) in &incoming {
            if *payee != &self.custody && state.balance(payee).checked_add(*amount).is_none() {
                return Err(LedgerError::InvalidAmount {
                    message: "Balance overflow".to_string(),
                });
            }
        }

        let entry_ids = legs
            .iter()
            .map(|leg| {
                state.apply_transfer(
                    &self.custody,
                    &leg.payee,
                    leg.amount,
                    EntryReason::EscrowRelease { transaction_id },
                    Some(transaction_id),
                )
            })
            .collect::<Vec<_>>();

        debug!(tx = %transaction_id, legs = entry_ids.len(), total = %total, "Payout applied");
        Ok(entry_ids)
    }
}
