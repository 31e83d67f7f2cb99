//! Transaction log records and query filters.

use crate::amount::Amount;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Transaction type variants with their parties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionKind {
    /// Funds added to an account from outside the ledger.
    Deposit { user_id: String },

    /// Funds sent out of the ledger to a bank account.
    Withdrawal {
        user_id: String,
        destination: String,
    },

    /// Funds moved between two accounts.
    Transfer { from: String, to: String },

    /// Interest credited during an accrual.
    Interest { user_id: String },

    /// Positive real-time adjustment.
    Credit { user_id: String },

    /// Negative real-time adjustment. The recorded amount is negative.
    Debit { user_id: String },
}

impl TransactionKind {
    /// The type tag: `deposit`, `withdrawal`, `transfer`, `interest`, `credit` or `debit`.
    pub fn type_name(&self) -> &'static str {
        match self {
            TransactionKind::Deposit { .. } => "deposit",
            TransactionKind::Withdrawal { .. } => "withdrawal",
            TransactionKind::Transfer { .. } => "transfer",
            TransactionKind::Interest { .. } => "interest",
            TransactionKind::Credit { .. } => "credit",
            TransactionKind::Debit { .. } => "debit",
        }
    }

    /// The sole party of a single-party transaction.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            TransactionKind::Deposit { user_id }
            | TransactionKind::Withdrawal { user_id, .. }
            | TransactionKind::Interest { user_id }
            | TransactionKind::Credit { user_id }
            | TransactionKind::Debit { user_id } => Some(user_id.as_str()),
            TransactionKind::Transfer { .. } => None,
        }
    }

    pub fn from(&self) -> Option<&str> {
        match self {
            TransactionKind::Transfer { from, .. } => Some(from.as_str()),
            _ => None,
        }
    }

    pub fn to(&self) -> Option<&str> {
        match self {
            TransactionKind::Transfer { to, .. } => Some(to.as_str()),
            _ => None,
        }
    }

    pub fn destination(&self) -> Option<&str> {
        match self {
            TransactionKind::Withdrawal { destination, .. } => Some(destination.as_str()),
            _ => None,
        }
    }
}

/// Lifecycle state of a transaction. Only completed transactions exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable entry in the append-only transaction log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Globally unique transaction ID
    pub id: Uuid,

    /// Transaction type and parties
    pub kind: TransactionKind,

    /// Amount moved. Negative only for `debit`.
    pub amount: Amount,

    /// Non-decreasing across the log
    pub timestamp: DateTime<Utc>,

    pub status: TransactionStatus,
}

impl Transaction {
    /// Creates a completed transaction with a fresh ID.
    pub fn new(kind: TransactionKind, amount: Amount, timestamp: DateTime<Utc>) -> Self {
        Transaction {
            id: Uuid::new_v4(),
            kind,
            amount,
            timestamp,
            status: TransactionStatus::Completed,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Whether `user_id` is the sole party, the sender, or the receiver.
    pub fn involves(&self, user_id: &str) -> bool {
        self.kind.user_id() == Some(user_id)
            || self.kind.from() == Some(user_id)
            || self.kind.to() == Some(user_id)
    }

    /// Returns the named field rendered as a string, if this transaction carries it.
    ///
    /// Known fields: `id`, `type`, `user_id`, `from`, `to`, `destination`,
    /// `amount`, `status`, `timestamp`.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "id" => Some(self.id.to_string()),
            "type" => Some(self.type_name().to_string()),
            "user_id" => self.kind.user_id().map(str::to_string),
            "from" => self.kind.from().map(str::to_string),
            "to" => self.kind.to().map(str::to_string),
            "destination" => self.kind.destination().map(str::to_string),
            "amount" => Some(self.amount.to_string()),
            "status" => Some(self.status.to_string()),
            "timestamp" => Some(self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            _ => None,
        }
    }

    /// Equality test of a single field against `value`.
    ///
    /// `amount` is compared numerically, so `"100"` matches `100.0000`.
    pub fn field_matches(&self, name: &str, value: &str) -> bool {
        if name == "amount" {
            return Amount::from_str(value)
                .map(|v| v == self.amount)
                .unwrap_or(false);
        }
        self.field(name).as_deref() == Some(value)
    }
}

/// A conjunction of field equality constraints.
///
/// # Examples
///
/// ```
/// use wallet_ledger::TransactionFilter;
///
/// let filter = TransactionFilter::new().field("type", "deposit");
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    constraints: Vec<(String, String)>,
}

impl TransactionFilter {
    /// A filter that matches every transaction.
    pub fn new() -> Self {
        TransactionFilter::default()
    }

    /// Adds an equality constraint on `name`.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.push((name.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        self.constraints
            .iter()
            .all(|(name, value)| tx.field_matches(name, value))
    }
}
