//! EscrowKit Types - Canonical domain types for conditional value escrow
//!
//! This crate contains the foundational types shared by every EscrowKit crate,
//! with zero dependencies on other escrowkit crates:
//!
//! - Identity types (AccountId, TransactionId)
//! - Amount arithmetic in smallest units
//! - Transaction records, terms, votes and status
//! - Events appended to the event sink
//! - The error taxonomy
//!
//! # Invariants
//!
//! 1. A transaction settles exactly once
//! 2. Every settlement conserves value: sender share + receiver share == committed
//! 3. Votes, status and commitment are frozen after settlement

pub mod identity;
pub mod amount;
pub mod transaction;
pub mod event;
pub mod error;

pub use identity::*;
pub use amount::*;
pub use transaction::*;
pub use event::*;
pub use error::*;
