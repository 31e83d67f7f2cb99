//! Input shape checks run by the ledger before any mutation.
//!
//! Every function here is a pure predicate. The ledger maps a `false` result
//! to the matching [`LedgerError`](crate::LedgerError) variant.

use crate::payment::PaymentType;

/// Minimum password length accepted at account creation.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Accepted PIN lengths (inclusive).
pub const PIN_LEN: std::ops::RangeInclusive<usize> = 4..=8;

/// Prefix every withdrawal destination must carry.
pub const BANK_ACCOUNT_PREFIX: &str = "PT";

/// Minimum bank account length, prefix included.
pub const MIN_BANK_ACCOUNT_LEN: usize = 10;

pub fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty()
}

/// Non-empty and contains `@`. Deliverability is not checked.
pub fn is_valid_email(email: &str) -> bool {
    !email.is_empty() && email.contains('@')
}

pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

/// 4 to 8 ASCII decimal digits.
pub fn is_valid_pin(pin: &str) -> bool {
    PIN_LEN.contains(&pin.len()) && pin.bytes().all(|b| b.is_ascii_digit())
}

/// Simulated bank-account verification: `PT` prefix and at least 10 characters.
pub fn is_valid_bank_account(account: &str) -> bool {
    account.starts_with(BANK_ACCOUNT_PREFIX) && account.chars().count() >= MIN_BANK_ACCOUNT_LEN
}

pub fn is_valid_payment_type(tag: &str) -> bool {
    tag.parse::<PaymentType>().is_ok()
}
