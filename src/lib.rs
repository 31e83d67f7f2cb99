//! # Wallet Ledger
//!
//! An in-memory ledger core that keeps per-user balances, an append-only
//! transaction log, and auxiliary per-user records (PIN, payment methods,
//! spending limits).
//!
//! ## Design Principles
//!
//! - **Fixed-point arithmetic**: Uses 4 decimal places via `rust_decimal`
//! - **Validate, then mutate**: A rejected call never leaves partial state
//! - **Strict invariants**: Balances never go negative, transfers conserve
//!   the total, auxiliary records only exist for real accounts
//! - **Deterministic ordering**: Accounts iterate by user id
//!
//! ## Example
//!
//! ```
//! use wallet_ledger::{Amount, Ledger};
//!
//! let mut ledger = Ledger::new();
//! ledger.create_account("alice", "alice@example.com", "password123").unwrap();
//! ledger.create_account("bob", "bob@example.com", "password456").unwrap();
//! ledger.add_funds("alice", Amount::from(1000)).unwrap();
//! ledger.transfer("alice", "bob", Amount::from(300)).unwrap();
//!
//! assert_eq!(ledger.balance("alice").unwrap(), Amount::from(700));
//! assert_eq!(ledger.total_balance(), Amount::from(1000));
//! ```

pub mod account;
pub mod amount;
pub mod clock;
pub mod error;
pub mod ledger;
pub mod limits;
pub mod payment;
pub mod script;
pub mod shared;
pub mod transaction;
pub mod validation;

pub use account::Account;
pub use amount::Amount;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorKind, LedgerError, Result};
pub use ledger::{
    Ledger, DEFAULT_PAGE_SIZE, MAX_DEPOSIT, MAX_INTEREST_RATE, MAX_PAGE_SIZE, MAX_WITHDRAWAL,
};
pub use limits::SpendingLimit;
pub use payment::{PaymentMethod, PaymentType};
pub use shared::SharedLedger;
pub use transaction::{Transaction, TransactionFilter, TransactionKind, TransactionStatus};
