//! Operation scripts: CSV replay of ledger calls for the CLI.
//!
//! Columns are `op,user,arg,amount,extra`:
//!
//! | op         | user     | arg            | amount        | extra                  |
//! |------------|----------|----------------|---------------|------------------------|
//! | `create`   | user id  | email          |               | password               |
//! | `pin`      | user id  |                |               | pin                    |
//! | `deposit`  | user id  |                | amount        |                        |
//! | `withdraw` | user id  | bank account   | amount        |                        |
//! | `transfer` | sender   | receiver       | amount        |                        |
//! | `interest` |          |                | rate          |                        |
//! | `update`   | user id  |                | signed amount |                        |
//! | `limits`   | user id  | daily (opt.)   | monthly (opt.)|                        |
//! | `payment`  | user id  | payment type   |               | `key=value;key=value`  |

use crate::amount::Amount;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::payment::PaymentMethod;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::{Read, Write};
use std::str::FromStr;

/// Raw script row as read from CSV.
#[derive(Debug, Default, Deserialize)]
pub struct ScriptRecord {
    pub op: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub arg: Option<String>,

    #[serde(default)]
    pub amount: Option<String>,

    #[serde(default)]
    pub extra: Option<String>,
}

/// A parsed ledger call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateAccount {
        user_id: String,
        email: String,
        password: String,
    },
    SetPin {
        user_id: String,
        pin: String,
    },
    AddFunds {
        user_id: String,
        amount: Amount,
    },
    WithdrawFunds {
        user_id: String,
        bank_account: String,
        amount: Amount,
    },
    Transfer {
        from: String,
        to: String,
        amount: Amount,
    },
    ApplyInterest {
        rate: Decimal,
    },
    RealTimeUpdate {
        user_id: String,
        amount: Amount,
    },
    SetSpendingLimits {
        user_id: String,
        daily: Option<Amount>,
        monthly: Option<Amount>,
    },
    AddPaymentMethod {
        user_id: String,
        method: PaymentMethod,
    },
}

impl ScriptRecord {
    /// Parses the raw row into a command.
    ///
    /// Returns `None` for unknown ops and missing or unparseable fields.
    /// Shape checks (email format, PIN digits, ...) are left to the ledger.
    pub fn parse(&self) -> Option<Command> {
        let op = self.op.trim().to_lowercase();

        match op.as_str() {
            "create" => Some(Command::CreateAccount {
                user_id: self.user()?,
                email: text(&self.arg)?,
                password: text(&self.extra)?,
            }),
            "pin" => Some(Command::SetPin {
                user_id: self.user()?,
                pin: text(&self.extra)?,
            }),
            "deposit" => Some(Command::AddFunds {
                user_id: self.user()?,
                amount: amount(&self.amount)?,
            }),
            "withdraw" => Some(Command::WithdrawFunds {
                user_id: self.user()?,
                bank_account: text(&self.arg)?,
                amount: amount(&self.amount)?,
            }),
            "transfer" => Some(Command::Transfer {
                from: self.user()?,
                to: text(&self.arg)?,
                amount: amount(&self.amount)?,
            }),
            "interest" => Some(Command::ApplyInterest {
                rate: Decimal::from_str(&text(&self.amount)?).ok()?,
            }),
            "update" => Some(Command::RealTimeUpdate {
                user_id: self.user()?,
                amount: amount(&self.amount)?,
            }),
            "limits" => Some(Command::SetSpendingLimits {
                user_id: self.user()?,
                daily: optional_amount(&self.arg)?,
                monthly: optional_amount(&self.amount)?,
            }),
            "payment" => {
                let mut method = PaymentMethod::new(text(&self.arg)?);
                for pair in self.extra.as_deref().unwrap_or("").split(';') {
                    let pair = pair.trim();
                    if pair.is_empty() {
                        continue;
                    }
                    let (key, value) = pair.split_once('=')?;
                    method = method.with_detail(key.trim(), value.trim());
                }
                Some(Command::AddPaymentMethod {
                    user_id: self.user()?,
                    method,
                })
            }
            _ => None,
        }
    }

    fn user(&self) -> Option<String> {
        text(&self.user)
    }
}

/// Non-empty trimmed field.
fn text(field: &Option<String>) -> Option<String> {
    let trimmed = field.as_deref()?.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

fn amount(field: &Option<String>) -> Option<Amount> {
    Amount::from_str(&text(field)?).ok()
}

/// `Some(None)` for an empty field, `None` if present but unparseable.
fn optional_amount(field: &Option<String>) -> Option<Option<Amount>> {
    match text(field) {
        None => Some(None),
        Some(s) => Amount::from_str(&s).ok().map(Some),
    }
}

impl Command {
    /// Applies the command to `ledger`.
    pub fn apply(self, ledger: &mut Ledger) -> Result<()> {
        match self {
            Command::CreateAccount {
                user_id,
                email,
                password,
            } => ledger.create_account(&user_id, &email, &password),
            Command::SetPin { user_id, pin } => ledger.set_pin(&user_id, &pin),
            Command::AddFunds { user_id, amount } => {
                ledger.add_funds(&user_id, amount).map(|_| ())
            }
            Command::WithdrawFunds {
                user_id,
                bank_account,
                amount,
            } => ledger
                .withdraw_funds(&user_id, &bank_account, amount)
                .map(|_| ()),
            Command::Transfer { from, to, amount } => {
                ledger.transfer(&from, &to, amount).map(|_| ())
            }
            Command::ApplyInterest { rate } => ledger.apply_interest(rate).map(|_| ()),
            Command::RealTimeUpdate { user_id, amount } => {
                ledger.real_time_update(&user_id, amount).map(|_| ())
            }
            Command::SetSpendingLimits {
                user_id,
                daily,
                monthly,
            } => ledger.set_spending_limits(&user_id, daily, monthly),
            Command::AddPaymentMethod { user_id, method } => {
                ledger.add_payment_method(&user_id, method)
            }
        }
    }
}

/// Outcome counts of a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub rejected: usize,
}

/// Replays a CSV script against `ledger`, one row at a time.
///
/// Rows that fail to parse or that the ledger rejects are logged at warn
/// level and skipped; a rejected row never changes the ledger.
pub fn replay_csv<R: Read>(ledger: &mut Ledger, reader: R) -> Result<ReplaySummary> {
    let mut csv_reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut summary = ReplaySummary::default();
    for (row_idx, result) in csv_reader.deserialize::<ScriptRecord>().enumerate() {
        let row_num = row_idx + 2; // 1-indexed, accounting for header row

        let command = match result {
            Ok(record) => match record.parse() {
                Some(command) => command,
                None => {
                    warn!("Row {}: Failed to parse {:?} operation", row_num, record.op);
                    summary.rejected += 1;
                    continue;
                }
            },
            Err(e) => {
                warn!("Row {}: CSV parse error: {}", row_num, e);
                summary.rejected += 1;
                continue;
            }
        };

        match command.apply(ledger) {
            Ok(()) => {
                debug!("Row {}: applied", row_num);
                summary.applied += 1;
            }
            Err(e) => {
                warn!("Row {}: [{}] {}", row_num, e.code(), e);
                summary.rejected += 1;
            }
        }
    }

    Ok(summary)
}

/// Writes final balances as CSV, ascending by user id, 4 decimal places.
pub fn write_balances<W: Write>(ledger: &Ledger, writer: W) -> Result<()> {
    // Header written by hand so an empty ledger still gets one
    let mut csv_writer = WriterBuilder::new().has_headers(false).from_writer(writer);

    csv_writer.write_record(["user_id", "balance"])?;

    for account in ledger.accounts() {
        csv_writer.serialize(account)?;
    }

    csv_writer.flush()?;
    Ok(())
}
