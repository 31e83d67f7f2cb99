//! Per-user spending limits.
//!
//! Limits are recorded but not enforced: no ledger operation consults them or
//! advances the `*_used` counters. They are reset to zero whenever limits
//! are (re)set.

use crate::amount::Amount;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendingLimit {
    /// Daily ceiling, `None` when unlimited.
    pub daily: Option<Amount>,

    /// Monthly ceiling, `None` when unlimited.
    pub monthly: Option<Amount>,

    pub daily_used: Amount,

    pub monthly_used: Amount,
}

impl SpendingLimit {
    /// Creates a limit record with zeroed usage counters.
    pub fn new(daily: Option<Amount>, monthly: Option<Amount>) -> Self {
        SpendingLimit {
            daily,
            monthly,
            daily_used: Amount::ZERO,
            monthly_used: Amount::ZERO,
        }
    }
}
