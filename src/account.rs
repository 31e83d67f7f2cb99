//! Account balance record and its checked balance changes.
//!
//! Maintains the invariant: `balance >= 0` at all times.

use crate::amount::Amount;
use crate::error::{LedgerError, Result};
use serde::Serialize;

/// A user's balance record.
///
/// # Invariants
///
/// - `balance >= 0` after every operation
/// - `balance <= Amount::MAX`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    /// Unique user identifier.
    pub user_id: String,

    /// Current balance. Never negative.
    pub balance: Amount,
}

impl Account {
    /// Creates a new account with a zero balance.
    pub fn new(user_id: impl Into<String>) -> Self {
        Account {
            user_id: user_id.into(),
            balance: Amount::ZERO,
        }
    }

    /// Balance after crediting `amount`, without applying it.
    ///
    /// Fails with `Overflow` if the sum would pass `Amount::MAX`.
    pub fn credited(&self, amount: Amount) -> Result<Amount> {
        self.balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(self.user_id.clone()))
    }

    /// Balance after debiting `amount`, without applying it.
    ///
    /// Fails with `InsufficientFunds` if the result would be negative.
    pub fn debited(&self, amount: Amount) -> Result<Amount> {
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                available: self.balance,
                requested: amount,
            });
        }
        self.balance
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::Overflow(self.user_id.clone()))
    }

    /// Verifies the invariant: `balance >= 0`.
    pub fn check_invariant(&self) -> bool {
        !self.balance.is_negative()
    }
}
