//! Payment method records attached to accounts.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Recognized payment method tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentType {
    Card,
    BankAccount,
    Paypal,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Card => "card",
            PaymentType::BankAccount => "bank_account",
            PaymentType::Paypal => "paypal",
        }
    }
}

impl FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(PaymentType::Card),
            "bank_account" => Ok(PaymentType::BankAccount),
            "paypal" => Ok(PaymentType::Paypal),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment method as supplied by the caller.
///
/// The `method_type` tag is kept as the caller's string so the ledger can
/// reject unknown tags with a typed error; `details` carries the
/// type-specific fields (`last4`, `brand`, `iban`, `email`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentMethod {
    pub method_type: String,

    pub details: BTreeMap<String, String>,
}

impl PaymentMethod {
    /// Creates a payment method with no details.
    pub fn new(method_type: impl Into<String>) -> Self {
        PaymentMethod {
            method_type: method_type.into(),
            details: BTreeMap::new(),
        }
    }

    /// Adds a type-specific field.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Parsed tag, or `None` if unrecognized.
    pub fn payment_type(&self) -> Option<PaymentType> {
        self.method_type.parse().ok()
    }

    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }
}
