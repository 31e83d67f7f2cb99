//! Thread-safe handle over a [`Ledger`].
//!
//! Every mutating call holds the write lock for its whole
//! validate/mutate/verify section, so concurrent callers can never observe
//! a half-applied transfer or accrual. Read-only calls share the read lock
//! and return owned snapshots.

use crate::amount::Amount;
use crate::error::{LedgerError, Result};
use crate::ledger::Ledger;
use crate::payment::PaymentMethod;
use crate::transaction::{Transaction, TransactionFilter};
use rust_decimal::Decimal;
use std::sync::{Arc, RwLock};

/// Cloneable, shareable ledger handle.
#[derive(Debug, Clone, Default)]
pub struct SharedLedger {
    inner: Arc<RwLock<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        SharedLedger {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    /// Runs `f` under the read lock.
    pub fn read<T>(&self, f: impl FnOnce(&Ledger) -> T) -> Result<T> {
        let ledger = self.inner.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(f(&ledger))
    }

    /// Runs `f` under the write lock as one critical section.
    pub fn write<T>(&self, f: impl FnOnce(&mut Ledger) -> Result<T>) -> Result<T> {
        let mut ledger = self.inner.write().map_err(|_| LedgerError::LockPoisoned)?;
        f(&mut ledger)
    }

    pub fn create_account(&self, user_id: &str, email: &str, password: &str) -> Result<()> {
        self.write(|ledger| ledger.create_account(user_id, email, password))
    }

    pub fn set_pin(&self, user_id: &str, pin: &str) -> Result<()> {
        self.write(|ledger| ledger.set_pin(user_id, pin))
    }

    pub fn authenticate_pin(&self, user_id: &str, pin: &str) -> Result<bool> {
        self.read(|ledger| ledger.authenticate_pin(user_id, pin))?
    }

    pub fn add_funds(&self, user_id: &str, amount: Amount) -> Result<Transaction> {
        self.write(|ledger| ledger.add_funds(user_id, amount).cloned())
    }

    pub fn withdraw_funds(
        &self,
        user_id: &str,
        bank_account: &str,
        amount: Amount,
    ) -> Result<Transaction> {
        self.write(|ledger| {
            ledger
                .withdraw_funds(user_id, bank_account, amount)
                .cloned()
        })
    }

    pub fn transfer(&self, from: &str, to: &str, amount: Amount) -> Result<Transaction> {
        self.write(|ledger| ledger.transfer(from, to, amount).cloned())
    }

    pub fn apply_interest(&self, rate: Decimal) -> Result<usize> {
        self.write(|ledger| ledger.apply_interest(rate))
    }

    pub fn real_time_update(&self, user_id: &str, amount: Amount) -> Result<Transaction> {
        self.write(|ledger| ledger.real_time_update(user_id, amount).cloned())
    }

    pub fn set_spending_limits(
        &self,
        user_id: &str,
        daily: Option<Amount>,
        monthly: Option<Amount>,
    ) -> Result<()> {
        self.write(|ledger| ledger.set_spending_limits(user_id, daily, monthly))
    }

    pub fn add_payment_method(&self, user_id: &str, method: PaymentMethod) -> Result<()> {
        self.write(|ledger| ledger.add_payment_method(user_id, method))
    }

    pub fn get_payment_methods(&self, user_id: &str) -> Result<Vec<PaymentMethod>> {
        self.read(|ledger| ledger.get_payment_methods(user_id).map(<[_]>::to_vec))?
    }

    pub fn track_transactions(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Transaction>> {
        self.read(|ledger| {
            ledger
                .track_transactions(user_id, filter, page, page_size)
                .map(|txs| txs.into_iter().cloned().collect())
        })?
    }

    pub fn balance(&self, user_id: &str) -> Result<Amount> {
        self.read(|ledger| ledger.balance(user_id))?
    }

    pub fn total_balance(&self) -> Result<Amount> {
        self.read(Ledger::total_balance)
    }

    pub fn verify_invariants(&self) -> Result<()> {
        self.read(Ledger::verify_invariants)?
    }
}

impl From<Ledger> for SharedLedger {
    fn from(ledger: Ledger) -> Self {
        SharedLedger::new(ledger)
    }
}
