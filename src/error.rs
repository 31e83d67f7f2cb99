//! Error types for the wallet ledger.

use crate::amount::Amount;
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Stable classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The referenced user has no account.
    NotFound,
    /// Malformed or out-of-range input.
    InvalidArgument,
    /// Well-formed input that breaks a business rule.
    FailedPrecondition,
    /// A ledger defect; never produced by a correct implementation.
    Internal,
    /// Failure reading or parsing CLI input.
    Io,
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::FailedPrecondition => "FAILED_PRECONDITION",
            ErrorKind::Internal => "INTERNAL",
            ErrorKind::Io => "IO",
        }
    }
}

/// Errors that can occur during ledger operation.
///
/// Every rejection is raised before any state is touched, so a caller that
/// receives an error can assume the ledger is exactly as it was.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Invalid user id: must be non-empty")]
    InvalidUserId,

    #[error("Invalid email address: {0:?}")]
    InvalidEmail(String),

    #[error("Password too weak: must be at least 6 characters")]
    WeakPassword,

    #[error("Invalid PIN: must be 4 to 8 decimal digits")]
    InvalidPin,

    #[error("Invalid bank account: {0:?}")]
    InvalidBankAccount(String),

    #[error("Invalid payment type: {0:?}")]
    InvalidPaymentType(String),

    /// Amount must be strictly positive
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Amount),

    #[error("Amount cannot be zero")]
    ZeroAmount,

    #[error("Invalid interest rate {0}: must be in (0, 0.20]")]
    InvalidRate(Decimal),

    #[error("Invalid spending limit {0}: must be positive")]
    InvalidLimit(Amount),

    #[error("Invalid page {0}: must be >= 1")]
    InvalidPage(usize),

    #[error("Invalid page size {0}: must be between 1 and 100")]
    InvalidPageSize(usize),

    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    #[error("Sender and receiver must be different: {0}")]
    SelfTransfer(String),

    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientFunds { available: Amount, requested: Amount },

    /// Amount above the per-operation safety ceiling
    #[error("Amount {amount} exceeds limit of {limit}")]
    ExceedsCeiling { amount: Amount, limit: Amount },

    #[error("Daily limit {daily} exceeds monthly limit {monthly}")]
    DailyExceedsMonthly { daily: Amount, monthly: Amount },

    #[error("Arithmetic overflow for account {0}")]
    Overflow(String),

    /// Post-mutation consistency check failed
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Ledger lock poisoned by a panicked writer")]
    LockPoisoned,

    /// Failed to open or read the input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Missing input file argument
    #[error("Missing input file argument. Usage: wallet-ledger <script.csv>")]
    MissingArgument,
}

impl LedgerError {
    /// Returns the stable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::AccountNotFound(_) => ErrorKind::NotFound,

            LedgerError::InvalidUserId
            | LedgerError::InvalidEmail(_)
            | LedgerError::WeakPassword
            | LedgerError::InvalidPin
            | LedgerError::InvalidBankAccount(_)
            | LedgerError::InvalidPaymentType(_)
            | LedgerError::NonPositiveAmount(_)
            | LedgerError::ZeroAmount
            | LedgerError::InvalidRate(_)
            | LedgerError::InvalidLimit(_)
            | LedgerError::InvalidPage(_)
            | LedgerError::InvalidPageSize(_) => ErrorKind::InvalidArgument,

            LedgerError::DuplicateAccount(_)
            | LedgerError::SelfTransfer(_)
            | LedgerError::InsufficientFunds { .. }
            | LedgerError::ExceedsCeiling { .. }
            | LedgerError::DailyExceedsMonthly { .. }
            | LedgerError::Overflow(_) => ErrorKind::FailedPrecondition,

            LedgerError::InvariantViolation(_) | LedgerError::LockPoisoned => ErrorKind::Internal,

            LedgerError::Io(_) | LedgerError::Csv(_) | LedgerError::MissingArgument => {
                ErrorKind::Io
            }
        }
    }

    /// Shorthand for `self.kind().code()`.
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }
}
