//! Amount type for EscrowKit
//!
//! Amounts are unsigned integers in the ledger's smallest unit. All arithmetic
//! is checked; there is no implicit rounding anywhere in the crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-negative value in smallest units
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(pub u64);

impl Amount {
    pub fn zero() -> Self {
        Self(0)
    }

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Split into `(floor(self / 2), self - floor(self / 2))`
    ///
    /// The second half carries the odd unit, so the two halves always sum
    /// back to `self`.
    pub fn halve(self) -> (Self, Self) {
        let lower = self.0 / 2;
        (Self(lower), Self(self.0 - lower))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |acc, a| Amount(acc.0.saturating_add(a.0)))
    }
}
