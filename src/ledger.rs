//! Core ledger engine.
//!
//! Owns every balance, the append-only transaction log and the per-user
//! records (PINs, payment methods, spending limits). Each mutating operation
//! validates all of its preconditions first and only then mutates, so a
//! rejected call never leaves partial state behind. In debug builds every
//! mutating operation re-verifies the global invariants and its own
//! postconditions afterwards and panics if they do not hold.

use crate::account::Account;
use crate::amount::Amount;
use crate::clock::{Clock, SystemClock};
use crate::error::{LedgerError, Result};
use crate::limits::SpendingLimit;
use crate::payment::PaymentMethod;
use crate::transaction::{Transaction, TransactionFilter, TransactionKind};
use crate::validation;
use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;

/// Largest single deposit accepted by [`Ledger::add_funds`].
pub const MAX_DEPOSIT: i64 = 1_000_000;

/// Largest single withdrawal accepted by [`Ledger::withdraw_funds`].
pub const MAX_WITHDRAWAL: i64 = 10_000;

/// Highest rate accepted by [`Ledger::apply_interest`] (0.20).
pub const MAX_INTEREST_RATE: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

/// Page size used by callers that do not pick one.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Largest page size accepted by [`Ledger::track_transactions`].
pub const MAX_PAGE_SIZE: usize = 100;

/// The wallet ledger.
///
/// # Invariants
///
/// Checked by [`Ledger::verify_invariants`]:
///
/// - every account is stored under its own `user_id` (unique by construction)
/// - every balance is `>= 0`
/// - balances sum to the recorded total, which never exceeds [`Amount::MAX`]
/// - PINs, payment methods and spending limits only exist for existing accounts
/// - transaction timestamps are non-decreasing in log order
///
/// # Account Ordering
///
/// Accounts are kept sorted by `user_id`. Interest accrual and account
/// listings follow that order, which makes the interest transactions of one
/// accrual deterministic.
pub struct Ledger {
    accounts: BTreeMap<String, Account>,

    /// Sum of all balances. Crediting past `Amount::MAX` is an overflow.
    total: Amount,

    /// Append-only log, in the order operations were applied.
    transactions: Vec<Transaction>,

    pins: BTreeMap<String, String>,

    payment_methods: BTreeMap<String, Vec<PaymentMethod>>,

    spending_limits: BTreeMap<String, SpendingLimit>,

    clock: Box<dyn Clock>,

    /// Timestamp of the newest transaction, used to clamp clock regressions.
    last_timestamp: Option<DateTime<Utc>>,
}

impl Ledger {
    /// Creates an empty ledger stamped by the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Creates an empty ledger that reads timestamps from `clock`.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Ledger {
            accounts: BTreeMap::new(),
            total: Amount::ZERO,
            transactions: Vec::new(),
            pins: BTreeMap::new(),
            payment_methods: BTreeMap::new(),
            spending_limits: BTreeMap::new(),
            clock: Box::new(clock),
            last_timestamp: None,
        }
    }

    // ------------------------------------------------------------------
    // Accounts and PINs
    // ------------------------------------------------------------------

    /// Opens a new account with a zero balance.
    ///
    /// `email` and `password` are only shape-checked; they are not stored.
    pub fn create_account(&mut self, user_id: &str, email: &str, password: &str) -> Result<()> {
        if !validation::is_valid_identifier(user_id) {
            return Err(LedgerError::InvalidUserId);
        }
        if self.accounts.contains_key(user_id) {
            return Err(LedgerError::DuplicateAccount(user_id.to_string()));
        }
        if !validation::is_valid_email(email) {
            return Err(LedgerError::InvalidEmail(email.to_string()));
        }
        if !validation::is_valid_password(password) {
            return Err(LedgerError::WeakPassword);
        }

        #[cfg(debug_assertions)]
        let (count_before, total_before) = (self.accounts.len(), self.total_balance());

        self.accounts
            .insert(user_id.to_string(), Account::new(user_id));
        debug!("Created account {}", user_id);

        #[cfg(debug_assertions)]
        {
            assert_eq!(self.accounts.len(), count_before + 1);
            assert_eq!(self.total_balance(), total_before);
            self.ensure_consistent();
        }

        Ok(())
    }

    /// Sets or replaces the PIN of an account.
    pub fn set_pin(&mut self, user_id: &str, pin: &str) -> Result<()> {
        self.account(user_id)?;
        if !validation::is_valid_pin(pin) {
            return Err(LedgerError::InvalidPin);
        }

        self.pins.insert(user_id.to_string(), pin.to_string());
        debug!("Set PIN for {}", user_id);

        #[cfg(debug_assertions)]
        self.ensure_consistent();

        Ok(())
    }

    /// Returns `true` if `pin` equals the stored PIN.
    ///
    /// An account without a PIN never authenticates.
    pub fn authenticate_pin(&self, user_id: &str, pin: &str) -> Result<bool> {
        self.account(user_id)?;
        Ok(self.pins.get(user_id).is_some_and(|stored| stored == pin))
    }

    pub fn has_pin(&self, user_id: &str) -> bool {
        self.pins.contains_key(user_id)
    }

    // ------------------------------------------------------------------
    // Funds
    // ------------------------------------------------------------------

    /// Deposits `amount` into an account.
    ///
    /// Requires `0 < amount <= MAX_DEPOSIT`. Appends one `deposit` transaction.
    pub fn add_funds(&mut self, user_id: &str, amount: Amount) -> Result<&Transaction> {
        #[cfg(debug_assertions)]
        let (total_before, log_before) = (self.total_balance(), self.transactions.len());

        let account = self.account(user_id)?;
        if !amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        let ceiling = Amount::from(MAX_DEPOSIT);
        if amount > ceiling {
            return Err(LedgerError::ExceedsCeiling {
                amount,
                limit: ceiling,
            });
        }
        let balance_after = account.credited(amount)?;
        let total_after = self.adjusted_total(user_id, amount)?;

        self.set_balance(user_id, balance_after);
        self.total = total_after;

        let index = self.append(
            TransactionKind::Deposit {
                user_id: user_id.to_string(),
            },
            amount,
        );
        debug!("Deposited {} to {}", amount, user_id);

        #[cfg(debug_assertions)]
        {
            assert_eq!(self.total_balance(), total_before + amount);
            assert_eq!(self.transactions.len(), log_before + 1);
            self.ensure_consistent();
        }

        Ok(&self.transactions[index])
    }

    /// Withdraws `amount` to an external bank account.
    ///
    /// Requires a valid destination, `0 < amount <= MAX_WITHDRAWAL` and a
    /// sufficient balance. Appends one `withdrawal` transaction.
    pub fn withdraw_funds(
        &mut self,
        user_id: &str,
        bank_account: &str,
        amount: Amount,
    ) -> Result<&Transaction> {
        #[cfg(debug_assertions)]
        let total_before = self.total_balance();

        let account = self.account(user_id)?;
        if !validation::is_valid_bank_account(bank_account) {
            return Err(LedgerError::InvalidBankAccount(bank_account.to_string()));
        }
        if !amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        let ceiling = Amount::from(MAX_WITHDRAWAL);
        if amount > ceiling {
            return Err(LedgerError::ExceedsCeiling {
                amount,
                limit: ceiling,
            });
        }
        let balance_after = account.debited(amount)?;
        let total_after = self.adjusted_total(user_id, -amount)?;

        self.set_balance(user_id, balance_after);
        self.total = total_after;
        let index = self.append(
            TransactionKind::Withdrawal {
                user_id: user_id.to_string(),
                destination: bank_account.to_string(),
            },
            amount,
        );
        debug!("Withdrew {} from {} to {}", amount, user_id, bank_account);

        #[cfg(debug_assertions)]
        {
            assert_eq!(self.total_balance(), total_before - amount);
            self.ensure_consistent();
        }

        Ok(&self.transactions[index])
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// The system-wide total is unchanged and no other account is touched.
    pub fn transfer(&mut self, from: &str, to: &str, amount: Amount) -> Result<&Transaction> {
        let sender = self.account(from)?;
        let receiver = self.account(to)?;
        if from == to {
            return Err(LedgerError::SelfTransfer(from.to_string()));
        }
        if !amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        let sender_after = sender.debited(amount)?;
        let receiver_after = receiver.credited(amount)?;

        #[cfg(debug_assertions)]
        let before = self.balance_snapshot();

        self.set_balance(from, sender_after);
        self.set_balance(to, receiver_after);
        let index = self.append(
            TransactionKind::Transfer {
                from: from.to_string(),
                to: to.to_string(),
            },
            amount,
        );
        debug!("Transferred {} from {} to {}", amount, from, to);

        #[cfg(debug_assertions)]
        {
            let after = self.balance_snapshot();
            let total = |m: &BTreeMap<String, Amount>| m.values().sum::<Amount>();
            assert_eq!(total(&after), total(&before), "transfer changed the total");
            for (user_id, balance) in &before {
                if user_id != from && user_id != to {
                    assert_eq!(after.get(user_id), Some(balance));
                }
            }
            self.ensure_consistent();
        }

        Ok(&self.transactions[index])
    }

    /// Credits interest at `rate` to every account.
    ///
    /// Each account receives `round_half_even(balance * rate)` at 4 decimal
    /// places, recorded as one `interest` transaction per account in
    /// `user_id` order (zero-balance accounts included). Returns the number of
    /// transactions appended.
    pub fn apply_interest(&mut self, rate: Decimal) -> Result<usize> {
        if rate <= Decimal::ZERO || rate > MAX_INTEREST_RATE {
            return Err(LedgerError::InvalidRate(rate));
        }

        let mut accruals = Vec::with_capacity(self.accounts.len());
        let mut total_after = self.total;
        for account in self.accounts.values() {
            let overflow = || LedgerError::Overflow(account.user_id.clone());
            let interest = account.balance.scaled_by(rate).ok_or_else(overflow)?;
            let balance_after = account.credited(interest)?;
            total_after = total_after.checked_add(interest).ok_or_else(overflow)?;
            accruals.push((account.user_id.clone(), interest, balance_after));
        }

        #[cfg(debug_assertions)]
        let (before, log_before) = (self.balance_snapshot(), self.transactions.len());

        let count = accruals.len();
        for (user_id, interest, balance_after) in accruals {
            self.set_balance(&user_id, balance_after);
            self.append(TransactionKind::Interest { user_id }, interest);
        }
        self.total = total_after;
        debug!("Applied interest at {} to {} accounts", rate, count);

        #[cfg(debug_assertions)]
        {
            for (user_id, old) in &before {
                let expected = old.checked_add(old.scaled_by(rate).unwrap_or_default());
                assert_eq!(self.balance(user_id).ok(), expected);
            }
            assert_eq!(self.transactions.len(), log_before + before.len());
            self.ensure_consistent();
        }

        Ok(count)
    }

    /// Applies a signed adjustment to one account.
    ///
    /// Positive amounts append a `credit`, negative amounts a `debit` (which
    /// requires a sufficient balance). The recorded amount keeps its sign.
    pub fn real_time_update(&mut self, user_id: &str, amount: Amount) -> Result<&Transaction> {
        #[cfg(debug_assertions)]
        let total_before = self.total_balance();

        let account = self.account(user_id)?;
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let (balance_after, kind) = if amount.is_positive() {
            let kind = TransactionKind::Credit {
                user_id: user_id.to_string(),
            };
            (account.credited(amount)?, kind)
        } else {
            let kind = TransactionKind::Debit {
                user_id: user_id.to_string(),
            };
            (account.debited(amount.abs())?, kind)
        };
        let total_after = self.adjusted_total(user_id, amount)?;

        self.set_balance(user_id, balance_after);
        self.total = total_after;

        let index = self.append(kind, amount);
        debug!("Real-time update of {} for {}", amount, user_id);

        #[cfg(debug_assertions)]
        {
            assert_eq!(self.total_balance(), total_before + amount);
            self.ensure_consistent();
        }

        Ok(&self.transactions[index])
    }

    // ------------------------------------------------------------------
    // Spending limits and payment methods
    // ------------------------------------------------------------------

    /// Replaces the spending limits of an account and zeroes usage.
    ///
    /// `None` means unlimited. When both are given `daily <= monthly`.
    pub fn set_spending_limits(
        &mut self,
        user_id: &str,
        daily: Option<Amount>,
        monthly: Option<Amount>,
    ) -> Result<()> {
        self.account(user_id)?;
        for limit in [daily, monthly].into_iter().flatten() {
            if !limit.is_positive() {
                return Err(LedgerError::InvalidLimit(limit));
            }
        }
        if let (Some(daily), Some(monthly)) = (daily, monthly) {
            if daily > monthly {
                return Err(LedgerError::DailyExceedsMonthly { daily, monthly });
            }
        }

        self.spending_limits
            .insert(user_id.to_string(), SpendingLimit::new(daily, monthly));
        debug!(
            "Set spending limits for {}: daily {:?}, monthly {:?}",
            user_id, daily, monthly
        );

        #[cfg(debug_assertions)]
        self.ensure_consistent();

        Ok(())
    }

    pub fn spending_limit(&self, user_id: &str) -> Result<Option<&SpendingLimit>> {
        self.account(user_id)?;
        Ok(self.spending_limits.get(user_id))
    }

    /// Appends a payment method, preserving insertion order.
    pub fn add_payment_method(&mut self, user_id: &str, method: PaymentMethod) -> Result<()> {
        self.account(user_id)?;
        if !validation::is_valid_payment_type(&method.method_type) {
            return Err(LedgerError::InvalidPaymentType(method.method_type));
        }

        debug!("Added {} payment method for {}", method.method_type, user_id);
        self.payment_methods
            .entry(user_id.to_string())
            .or_default()
            .push(method);

        #[cfg(debug_assertions)]
        self.ensure_consistent();

        Ok(())
    }

    /// Payment methods of an account in insertion order (empty if none).
    pub fn get_payment_methods(&self, user_id: &str) -> Result<&[PaymentMethod]> {
        self.account(user_id)?;
        Ok(self
            .payment_methods
            .get(user_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Returns one page of the transactions involving `user_id`.
    ///
    /// Transactions are kept if the user is the sole party, the sender or
    /// the receiver and `filter` matches, then sorted newest first (stable,
    /// so equal timestamps stay in log order). `page` is 1-based and
    /// `page_size` must be in `1..=MAX_PAGE_SIZE`. A page past the end is
    /// empty.
    pub fn track_transactions(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<&Transaction>> {
        self.account(user_id)?;
        if page < 1 {
            return Err(LedgerError::InvalidPage(page));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(LedgerError::InvalidPageSize(page_size));
        }

        let mut matching: Vec<&Transaction> = self
            .transactions
            .iter()
            .filter(|tx| tx.involves(user_id) && filter.matches(tx))
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let start = (page - 1).saturating_mul(page_size);
        Ok(matching.into_iter().skip(start).take(page_size).collect())
    }

    pub fn balance(&self, user_id: &str) -> Result<Amount> {
        Ok(self.account(user_id)?.balance)
    }

    /// Sum of all balances. Never exceeds [`Amount::MAX`].
    pub fn total_balance(&self) -> Amount {
        self.total
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Accounts in ascending `user_id` order.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// The full transaction log, oldest first.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    // ------------------------------------------------------------------
    // Invariants
    // ------------------------------------------------------------------

    /// Checks every global invariant.
    ///
    /// Returns `InvariantViolation` naming the first broken invariant.
    pub fn verify_invariants(&self) -> Result<()> {
        for (key, account) in &self.accounts {
            if key != &account.user_id {
                return Err(LedgerError::InvariantViolation(format!(
                    "account stored under {:?} belongs to {:?}",
                    key, account.user_id
                )));
            }
            if !account.check_invariant() {
                return Err(LedgerError::InvariantViolation(format!(
                    "negative balance {} for {}",
                    account.balance, key
                )));
            }
        }
        let summed = self
            .accounts
            .values()
            .try_fold(Amount::ZERO, |acc, account| acc.checked_add(account.balance));
        if summed != Some(self.total) {
            return Err(LedgerError::InvariantViolation(format!(
                "balances do not sum to the recorded total {}",
                self.total
            )));
        }
        if let Some(user_id) = self.orphan(self.pins.keys()) {
            return Err(LedgerError::InvariantViolation(format!(
                "PIN for non-existent user {}",
                user_id
            )));
        }
        if let Some(user_id) = self.orphan(self.payment_methods.keys()) {
            return Err(LedgerError::InvariantViolation(format!(
                "payment method for non-existent user {}",
                user_id
            )));
        }
        if let Some(user_id) = self.orphan(self.spending_limits.keys()) {
            return Err(LedgerError::InvariantViolation(format!(
                "spending limit for non-existent user {}",
                user_id
            )));
        }
        if let Some(pair) = self
            .transactions
            .windows(2)
            .find(|pair| pair[0].timestamp > pair[1].timestamp)
        {
            return Err(LedgerError::InvariantViolation(format!(
                "transaction {} is older than its predecessor {}",
                pair[1].id, pair[0].id
            )));
        }
        Ok(())
    }

    /// First key with no matching account.
    fn orphan<'a>(&self, mut keys: impl Iterator<Item = &'a String>) -> Option<&'a String> {
        keys.find(|user_id| !self.accounts.contains_key(*user_id))
    }

    /// Panics if any invariant is broken. A failure here is a ledger defect.
    #[cfg(debug_assertions)]
    fn ensure_consistent(&self) {
        if let Err(e) = self.verify_invariants() {
            panic!("{}", e);
        }
    }

    #[cfg(debug_assertions)]
    fn balance_snapshot(&self) -> BTreeMap<String, Amount> {
        self.accounts
            .iter()
            .map(|(user_id, account)| (user_id.clone(), account.balance))
            .collect()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn account(&self, user_id: &str) -> Result<&Account> {
        self.accounts
            .get(user_id)
            .ok_or_else(|| LedgerError::AccountNotFound(user_id.to_string()))
    }

    /// Total after applying a signed change to `user_id`'s balance.
    fn adjusted_total(&self, user_id: &str, delta: Amount) -> Result<Amount> {
        self.total
            .checked_add(delta)
            .ok_or_else(|| LedgerError::Overflow(user_id.to_string()))
    }

    /// Commits a balance computed during validation.
    fn set_balance(&mut self, user_id: &str, balance: Amount) {
        if let Some(account) = self.accounts.get_mut(user_id) {
            account.balance = balance;
        }
    }

    /// Appends a transaction and returns its index in the log.
    fn append(&mut self, kind: TransactionKind, amount: Amount) -> usize {
        let timestamp = self.next_timestamp();
        self.transactions
            .push(Transaction::new(kind, amount, timestamp));
        self.transactions.len() - 1
    }

    /// Reads the clock, never going behind the newest logged transaction.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = self.clock.now();
        let timestamp = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("accounts", &self.accounts)
            .field("total", &self.total)
            .field("transactions", &self.transactions.len())
            .field("pins", &self.pins.len())
            .field("payment_methods", &self.payment_methods)
            .field("spending_limits", &self.spending_limits)
            .field("last_timestamp", &self.last_timestamp)
            .finish()
    }
}
