//! Behaviour tests for the ledger operations.
//!
//! Covers the contract of every operation: accepted inputs, each rejection
//! path, and the system-wide properties (non-negativity, conservation,
//! interest scaling, read-only queries).

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::thread;
use wallet_ledger::{
    Amount, Clock, ErrorKind, Ledger, LedgerError, PaymentMethod, SharedLedger,
    TransactionFilter, DEFAULT_PAGE_SIZE,
};

/// Clock that moves forward one second on every reading.
#[derive(Default)]
struct TickingClock(AtomicI64);

impl Clock for TickingClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.0.fetch_add(1, Ordering::SeqCst);
        Utc.timestamp_opt(1_700_000_000 + tick, 0).unwrap()
    }
}

fn amt(s: &str) -> Amount {
    Amount::from_str(s).unwrap()
}

fn rate(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn ledger_with(users: &[&str]) -> Ledger {
    let mut ledger = Ledger::with_clock(TickingClock::default());
    for user in users {
        ledger
            .create_account(user, &format!("{}@email.com", user), "password123")
            .unwrap();
    }
    ledger
}

fn all(ledger: &Ledger, user: &str) -> Vec<String> {
    ledger
        .track_transactions(user, &TransactionFilter::new(), 1, DEFAULT_PAGE_SIZE)
        .unwrap()
        .into_iter()
        .map(|tx| tx.type_name().to_string())
        .collect()
}

// ==================== ACCOUNT CREATION ====================

#[test]
fn test_create_account_starts_at_zero() {
    let ledger = ledger_with(&["user1"]);
    assert_eq!(ledger.account_count(), 1);
    assert_eq!(ledger.balance("user1").unwrap(), Amount::ZERO);
    assert!(ledger.transactions().is_empty());
}

#[test]
fn test_create_account_leaves_other_balances() {
    let mut ledger = ledger_with(&["user1"]);
    ledger.add_funds("user1", amt("42")).unwrap();
    ledger
        .create_account("user2", "user2@email.com", "password456")
        .unwrap();

    assert_eq!(ledger.balance("user1").unwrap(), amt("42"));
    assert_eq!(ledger.account_count(), 2);
}

#[test]
fn test_create_account_rejections() {
    let mut ledger = ledger_with(&["user1"]);

    let err = ledger
        .create_account("user1", "user2@email.com", "password456")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    for (id, email, password) in [
        ("", "user@email.com", "password123"),
        ("user2", "invalid-email", "password123"),
        ("user2", "", "password123"),
        ("user2", "user@email.com", "123"),
    ] {
        let err = ledger.create_account(id, email, password).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{:?}", (id, email));
    }
    assert_eq!(ledger.account_count(), 1);
}

// ==================== PIN ====================

#[test]
fn test_set_and_authenticate_pin() {
    let mut ledger = ledger_with(&["user1"]);
    ledger.set_pin("user1", "1234").unwrap();

    assert!(ledger.authenticate_pin("user1", "1234").unwrap());
    assert!(!ledger.authenticate_pin("user1", "wrong").unwrap());
    assert!(!ledger.authenticate_pin("user1", "12345").unwrap());
}

#[test]
fn test_authenticate_without_pin_is_false() {
    let ledger = ledger_with(&["user1"]);
    assert!(!ledger.has_pin("user1"));
    assert!(!ledger.authenticate_pin("user1", "1234").unwrap());
}

#[test]
fn test_set_pin_rejections() {
    let mut ledger = ledger_with(&["user1"]);

    let err = ledger.set_pin("ghost", "1234").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    for pin in ["123", "123456789", "12a4", ""] {
        let err = ledger.set_pin("user1", pin).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPin), "pin {:?}", pin);
    }
    assert!(!ledger.has_pin("user1"));
}

#[test]
fn test_set_pin_replaces_previous() {
    let mut ledger = ledger_with(&["user1"]);
    ledger.set_pin("user1", "1234").unwrap();
    ledger.set_pin("user1", "87654321").unwrap();

    assert!(!ledger.authenticate_pin("user1", "1234").unwrap());
    assert!(ledger.authenticate_pin("user1", "87654321").unwrap());
}

#[test]
fn test_authenticate_unknown_user() {
    let ledger = Ledger::new();
    let err = ledger.authenticate_pin("ghost", "1234").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ==================== DEPOSITS ====================

#[test]
fn test_add_funds_scenario() {
    let mut ledger = ledger_with(&["alice"]);
    ledger.add_funds("alice", amt("1000")).unwrap();

    assert_eq!(ledger.balance("alice").unwrap(), amt("1000"));
    assert_eq!(all(&ledger, "alice"), vec!["deposit"]);
}

#[test]
fn test_add_funds_very_small_amount() {
    let mut ledger = ledger_with(&["small"]);
    ledger.add_funds("small", amt("0.01")).unwrap();
    assert_eq!(ledger.balance("small").unwrap(), amt("0.01"));
}

#[test]
fn test_add_funds_rejections() {
    let mut ledger = ledger_with(&["user1"]);

    assert_eq!(
        ledger.add_funds("ghost", amt("10")).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    for bad in ["0", "-10", "0.00001"] {
        let err = ledger.add_funds("user1", amt(bad)).unwrap_err();
        assert!(matches!(err, LedgerError::NonPositiveAmount(_)), "{}", bad);
    }
    let err = ledger.add_funds("user1", amt("1000001")).unwrap_err();
    assert!(matches!(err, LedgerError::ExceedsCeiling { .. }));

    assert_eq!(ledger.balance("user1").unwrap(), Amount::ZERO);
    assert!(ledger.transactions().is_empty());
}

// ==================== WITHDRAWALS ====================

#[test]
fn test_withdraw_funds_scenario() {
    let mut ledger = ledger_with(&["u"]);
    ledger.add_funds("u", amt("500")).unwrap();

    let tx = ledger
        .withdraw_funds("u", "PT500123456789", amt("200"))
        .unwrap();
    assert_eq!(tx.type_name(), "withdrawal");
    assert_eq!(tx.kind.destination(), Some("PT500123456789"));
    assert_eq!(ledger.balance("u").unwrap(), amt("300"));
}

#[test]
fn test_withdraw_to_invalid_destination() {
    let mut ledger = ledger_with(&["u"]);
    ledger.add_funds("u", amt("500")).unwrap();

    let err = ledger.withdraw_funds("u", "INVALID", amt("200")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(ledger.balance("u").unwrap(), amt("500"));
}

#[test]
fn test_withdraw_rejections() {
    let mut ledger = ledger_with(&["u"]);
    ledger.add_funds("u", amt("20000")).unwrap();

    let err = ledger
        .withdraw_funds("u", "PT500123456789", amt("10000.0001"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::ExceedsCeiling { .. }));

    let err = ledger
        .withdraw_funds("u", "PT500123456789", Amount::ZERO)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Exactly at the ceiling is allowed
    ledger
        .withdraw_funds("u", "PT500123456789", amt("10000"))
        .unwrap();

    let mut poor = ledger_with(&["p"]);
    poor.add_funds("p", amt("50")).unwrap();
    let err = poor
        .withdraw_funds("p", "PT500123456789", amt("100"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    assert_eq!(poor.balance("p").unwrap(), amt("50"));
}

#[test]
fn test_deposit_then_withdraw_restores_balance() {
    let mut ledger = ledger_with(&["u"]);
    ledger.add_funds("u", amt("75.25")).unwrap();
    let original = ledger.balance("u").unwrap();

    ledger.add_funds("u", amt("123.4567")).unwrap();
    ledger
        .withdraw_funds("u", "PT500123456789", amt("123.4567"))
        .unwrap();

    assert_eq!(ledger.balance("u").unwrap(), original);
    assert_eq!(ledger.transactions().len(), 3);
}

// ==================== TRANSFERS ====================

#[test]
fn test_transfer_scenario() {
    let mut ledger = ledger_with(&["alice", "bob"]);
    ledger.add_funds("alice", amt("1000")).unwrap();

    let tx = ledger.transfer("alice", "bob", amt("300")).unwrap();
    assert_eq!(tx.type_name(), "transfer");
    assert_eq!(tx.kind.from(), Some("alice"));
    assert_eq!(tx.kind.to(), Some("bob"));

    assert_eq!(ledger.balance("alice").unwrap(), amt("700"));
    assert_eq!(ledger.balance("bob").unwrap(), amt("300"));
    assert_eq!(ledger.total_balance(), amt("1000"));
}

#[test]
fn test_transfer_touches_only_two_accounts() {
    let mut ledger = ledger_with(&["alice", "bob", "carol"]);
    ledger.add_funds("alice", amt("100")).unwrap();
    ledger.add_funds("carol", amt("55.5")).unwrap();

    ledger.transfer("alice", "bob", amt("100")).unwrap();

    assert_eq!(ledger.balance("alice").unwrap(), Amount::ZERO);
    assert_eq!(ledger.balance("bob").unwrap(), amt("100"));
    assert_eq!(ledger.balance("carol").unwrap(), amt("55.5"));
}

#[test]
fn test_transfer_rejections() {
    let mut ledger = ledger_with(&["alice", "bob"]);
    ledger.add_funds("alice", amt("100")).unwrap();

    let kind = |result: wallet_ledger::Result<()>| result.unwrap_err().kind();

    assert_eq!(
        kind(ledger.transfer("ghost", "bob", amt("1")).map(|_| ())),
        ErrorKind::NotFound
    );
    assert_eq!(
        kind(ledger.transfer("alice", "ghost", amt("1")).map(|_| ())),
        ErrorKind::NotFound
    );
    assert_eq!(
        kind(ledger.transfer("alice", "alice", amt("1")).map(|_| ())),
        ErrorKind::FailedPrecondition
    );
    assert_eq!(
        kind(ledger.transfer("alice", "bob", Amount::ZERO).map(|_| ())),
        ErrorKind::InvalidArgument
    );
    assert_eq!(
        kind(ledger.transfer("alice", "bob", amt("100.0001")).map(|_| ())),
        ErrorKind::FailedPrecondition
    );
    assert_eq!(ledger.balance("alice").unwrap(), amt("100"));
    assert_eq!(ledger.balance("bob").unwrap(), Amount::ZERO);
    assert_eq!(ledger.transactions().len(), 1);
}

// ==================== INTEREST ====================

#[test]
fn test_apply_interest_scenario() {
    let mut ledger = ledger_with(&["alice", "bob"]);
    ledger.add_funds("alice", amt("700")).unwrap();
    ledger.add_funds("bob", amt("600")).unwrap();
    let log_before = ledger.transactions().len();

    let appended = ledger.apply_interest(rate("0.05")).unwrap();

    assert_eq!(appended, 2);
    assert_eq!(ledger.balance("alice").unwrap(), amt("735"));
    assert_eq!(ledger.balance("bob").unwrap(), amt("630"));
    assert_eq!(ledger.total_balance(), amt("1365"));

    let new_txs = &ledger.transactions()[log_before..];
    assert_eq!(new_txs.len(), 2);
    assert!(new_txs.iter().all(|tx| tx.type_name() == "interest"));
    assert_eq!(new_txs[0].kind.user_id(), Some("alice"));
    assert_eq!(new_txs[0].amount, amt("35"));
    assert_eq!(new_txs[1].kind.user_id(), Some("bob"));
    assert_eq!(new_txs[1].amount, amt("30"));
}

#[test]
fn test_apply_interest_includes_zero_balances() {
    let mut ledger = ledger_with(&["rich", "zero"]);
    ledger.add_funds("rich", amt("100")).unwrap();

    assert_eq!(ledger.apply_interest(rate("0.1")).unwrap(), 2);
    assert_eq!(ledger.balance("zero").unwrap(), Amount::ZERO);
    assert_eq!(all(&ledger, "zero"), vec!["interest"]);
}

#[test]
fn test_apply_interest_scaling_stays_within_half_minor_unit() {
    let mut ledger = ledger_with(&["a", "b", "c"]);
    ledger.add_funds("a", amt("33.3333")).unwrap();
    ledger.add_funds("b", amt("0.0007")).unwrap();
    ledger.add_funds("c", amt("999999.9999")).unwrap();
    let r = rate("0.0375");
    let before: Vec<Amount> = ledger.accounts().map(|a| a.balance).collect();

    ledger.apply_interest(r).unwrap();

    let half_unit = Decimal::from_str("0.00005").unwrap();
    let factor = Decimal::ONE + r;
    for (account, old) in ledger.accounts().zip(&before) {
        let exact = old.as_decimal() * factor;
        let diff = (account.balance.as_decimal() - exact).abs();
        assert!(diff <= half_unit, "{}: off by {}", account.user_id, diff);
    }
}

#[test]
fn test_apply_interest_invalid_rates() {
    let mut ledger = ledger_with(&["alice"]);
    for bad in ["0", "-0.01", "0.21"] {
        let err = ledger.apply_interest(rate(bad)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    assert!(ledger.transactions().is_empty());
}

#[test]
fn test_apply_interest_on_empty_ledger() {
    let mut ledger = Ledger::new();
    assert_eq!(ledger.apply_interest(rate("0.05")).unwrap(), 0);
}

#[test]
fn test_compounding_to_the_ceiling_conserves_and_renders() {
    let mut ledger = ledger_with(&["saver", "spender"]);
    ledger.add_funds("saver", amt("1000000")).unwrap();
    ledger.add_funds("spender", amt("1")).unwrap();

    let err = loop {
        let before = ledger.total_balance();
        match ledger.apply_interest(wallet_ledger::MAX_INTEREST_RATE) {
            Ok(_) => assert!(ledger.total_balance() > before),
            Err(e) => break e,
        }
    };
    assert!(matches!(err, LedgerError::Overflow(_)));
    assert_eq!(err.code(), "FAILED_PRECONDITION");
    assert!(ledger.total_balance() <= Amount::MAX);
    assert!(ledger.verify_invariants().is_ok());

    // Every balance keeps its minor unit, so one unit moves exactly
    let total = ledger.total_balance();
    let saver = ledger.balance("saver").unwrap();
    let spender = ledger.balance("spender").unwrap();
    let minor = amt("0.0001");
    ledger.transfer("saver", "spender", minor).unwrap();
    assert_eq!(ledger.balance("saver").unwrap(), saver - minor);
    assert_eq!(ledger.balance("spender").unwrap(), spender + minor);
    assert_eq!(ledger.total_balance(), total);

    let mut out = Vec::new();
    wallet_ledger::script::write_balances(&ledger, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains(&format!("saver,{}", saver - minor)));
}

#[test]
fn test_amounts_past_the_ceiling_do_not_parse() {
    assert!(Amount::from_str("1000000000000000000000000.0001").is_err());
    assert_eq!(amt("1000000000000000000000000"), Amount::MAX);
}

// ==================== REAL-TIME UPDATES ====================

#[test]
fn test_real_time_update_credit_and_debit() {
    let mut ledger = ledger_with(&["user1"]);

    let tx = ledger.real_time_update("user1", amt("50")).unwrap();
    assert_eq!(tx.type_name(), "credit");

    let tx = ledger.real_time_update("user1", amt("-20")).unwrap();
    assert_eq!(tx.type_name(), "debit");
    assert_eq!(tx.amount, amt("-20"));

    assert_eq!(ledger.balance("user1").unwrap(), amt("30"));
}

#[test]
fn test_real_time_update_rejections() {
    let mut ledger = ledger_with(&["user1"]);
    ledger.real_time_update("user1", amt("10")).unwrap();

    let err = ledger.real_time_update("user1", Amount::ZERO).unwrap_err();
    assert!(matches!(err, LedgerError::ZeroAmount));

    let err = ledger.real_time_update("user1", amt("-10.0001")).unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

    // Draining to exactly zero is allowed
    ledger.real_time_update("user1", amt("-10")).unwrap();
    assert_eq!(ledger.balance("user1").unwrap(), Amount::ZERO);
}

#[test]
fn test_rapid_real_time_updates() {
    let mut ledger = ledger_with(&["fast"]);
    for _ in 0..5 {
        ledger.real_time_update("fast", amt("10")).unwrap();
    }
    assert_eq!(ledger.balance("fast").unwrap(), amt("50"));
}

// ==================== SPENDING LIMITS ====================

#[test]
fn test_set_spending_limits() {
    let mut ledger = ledger_with(&["alice"]);
    ledger
        .set_spending_limits("alice", Some(amt("100")), Some(amt("1500")))
        .unwrap();

    let limit = ledger.spending_limit("alice").unwrap().unwrap();
    assert_eq!(limit.daily, Some(amt("100")));
    assert_eq!(limit.monthly, Some(amt("1500")));
    assert_eq!(limit.daily_used, Amount::ZERO);
    assert_eq!(limit.monthly_used, Amount::ZERO);
}

#[test]
fn test_spending_limits_daily_exceeds_monthly() {
    let mut ledger = ledger_with(&["alice"]);
    let err = ledger
        .set_spending_limits("alice", Some(amt("2000")), Some(amt("1000")))
        .unwrap_err();

    assert!(matches!(err, LedgerError::DailyExceedsMonthly { .. }));
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    assert!(ledger.spending_limit("alice").unwrap().is_none());
}

#[test]
fn test_spending_limits_partial_and_invalid() {
    let mut ledger = ledger_with(&["alice"]);
    ledger.set_spending_limits("alice", None, None).unwrap();
    ledger
        .set_spending_limits("alice", Some(amt("5000")), None)
        .unwrap();
    assert_eq!(
        ledger.spending_limit("alice").unwrap().unwrap().monthly,
        None
    );

    for (daily, monthly) in [(Some(amt("0")), None), (None, Some(amt("-1")))] {
        let err = ledger
            .set_spending_limits("alice", daily, monthly)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidLimit(_)));
    }
    assert_eq!(
        ledger
            .set_spending_limits("ghost", None, None)
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
}

// ==================== PAYMENT METHODS ====================

#[test]
fn test_payment_methods_keep_insertion_order() {
    let mut ledger = ledger_with(&["user1"]);
    let card = PaymentMethod::new("card")
        .with_detail("last4", "1234")
        .with_detail("brand", "Visa");
    let paypal = PaymentMethod::new("paypal").with_detail("email", "user@paypal.com");
    let bank = PaymentMethod::new("bank_account").with_detail("iban", "PT500123456789");

    ledger.add_payment_method("user1", card.clone()).unwrap();
    ledger.add_payment_method("user1", paypal.clone()).unwrap();
    ledger.add_payment_method("user1", bank.clone()).unwrap();

    assert_eq!(
        ledger.get_payment_methods("user1").unwrap(),
        &[card, paypal, bank]
    );
}

#[test]
fn test_payment_method_rejections() {
    let mut ledger = ledger_with(&["user1"]);

    let err = ledger
        .add_payment_method("ghost", PaymentMethod::new("card"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = ledger
        .add_payment_method("user1", PaymentMethod::new("invalid"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidPaymentType(ref t) if t == "invalid"));

    assert!(ledger.get_payment_methods("user1").unwrap().is_empty());
    assert_eq!(
        ledger.get_payment_methods("ghost").unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

// ==================== TRANSACTION TRACKING ====================

#[test]
fn test_track_transactions_only_involving_user() {
    let mut ledger = ledger_with(&["user1", "user2", "user3"]);
    ledger.add_funds("user1", amt("100")).unwrap();
    ledger.add_funds("user2", amt("200")).unwrap();
    ledger.add_funds("user3", amt("5")).unwrap();
    ledger.transfer("user2", "user1", amt("50")).unwrap();

    let txs = ledger
        .track_transactions("user1", &TransactionFilter::new(), 1, DEFAULT_PAGE_SIZE)
        .unwrap();

    assert_eq!(txs.len(), 2);
    assert!(txs.iter().all(|tx| tx.involves("user1")));
    assert!(txs
        .windows(2)
        .all(|pair| pair[0].timestamp >= pair[1].timestamp));
}

#[test]
fn test_track_transactions_with_filters() {
    let mut ledger = ledger_with(&["user1", "user2"]);
    ledger.add_funds("user1", amt("100")).unwrap();
    ledger.add_funds("user1", amt("200")).unwrap();
    ledger.transfer("user1", "user2", amt("50")).unwrap();

    let deposits = TransactionFilter::new().field("type", "deposit");
    let txs = ledger.track_transactions("user1", &deposits, 1, 25).unwrap();
    assert_eq!(txs.len(), 2);
    assert!(txs.iter().all(|tx| tx.type_name() == "deposit"));

    let withdrawals = TransactionFilter::new().field("type", "withdrawal");
    assert!(ledger
        .track_transactions("user1", &withdrawals, 1, 25)
        .unwrap()
        .is_empty());

    let received = TransactionFilter::new().field("to", "user2");
    let txs = ledger.track_transactions("user2", &received, 1, 25).unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].amount, amt("50"));

    let by_amount = TransactionFilter::new().field("amount", "200");
    assert_eq!(
        ledger
            .track_transactions("user1", &by_amount, 1, 25)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn test_track_transactions_pagination() {
    let mut ledger = ledger_with(&["user1"]);
    for i in 1..=30 {
        ledger.real_time_update("user1", Amount::from(i)).unwrap();
    }
    let filter = TransactionFilter::new();

    let mut seen = Vec::new();
    for page in 1..=3 {
        let txs = ledger.track_transactions("user1", &filter, page, 10).unwrap();
        assert_eq!(txs.len(), 10);
        seen.extend(txs.into_iter().map(|tx| tx.id));
    }
    assert!(ledger
        .track_transactions("user1", &filter, 4, 10)
        .unwrap()
        .is_empty());

    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 30);
}

#[test]
fn test_track_transactions_invalid_paging() {
    let ledger = ledger_with(&["user1"]);
    let filter = TransactionFilter::new();

    assert!(matches!(
        ledger.track_transactions("user1", &filter, 0, 10),
        Err(LedgerError::InvalidPage(0))
    ));
    for size in [0, 101] {
        assert!(matches!(
            ledger.track_transactions("user1", &filter, 1, size),
            Err(LedgerError::InvalidPageSize(_))
        ));
    }
    assert!(ledger.track_transactions("user1", &filter, 1, 100).is_ok());
    assert_eq!(
        ledger
            .track_transactions("ghost", &filter, 1, 10)
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
}

// ==================== PROPERTIES ====================

/// Deterministic pseudo-random sequence (64-bit LCG).
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

#[test]
fn test_random_sequences_preserve_invariants() {
    let users = ["alice", "bob", "carol", "dave"];
    let mut ledger = ledger_with(&users);
    let mut rng = Lcg(42);

    for _ in 0..500 {
        let user = users[rng.next(4) as usize];
        let other = users[rng.next(4) as usize];
        let amount = Amount::from(rng.next(3000) as i64 - 500);
        let total_before = ledger.total_balance();

        match rng.next(5) {
            0 => {
                let _ = ledger.add_funds(user, amount);
            }
            1 => {
                let _ = ledger.withdraw_funds(user, "PT500123456789", amount);
            }
            2 => {
                let _ = ledger.transfer(user, other, amount);
                assert_eq!(ledger.total_balance(), total_before);
            }
            3 => {
                let _ = ledger.real_time_update(user, amount);
            }
            _ => {
                if rng.next(10) == 0 {
                    let _ = ledger.apply_interest(rate("0.01"));
                }
            }
        }

        assert!(ledger.accounts().all(|a| !a.balance.is_negative()));
        ledger.verify_invariants().unwrap();
    }
}

#[test]
fn test_reads_do_not_mutate() {
    let mut ledger = ledger_with(&["alice", "bob"]);
    ledger.set_pin("alice", "1234").unwrap();
    ledger.add_funds("alice", amt("100")).unwrap();
    ledger.transfer("alice", "bob", amt("40")).unwrap();
    ledger
        .add_payment_method("alice", PaymentMethod::new("card"))
        .unwrap();

    let snapshot = format!("{:?}", ledger);
    let log = ledger.transactions().to_vec();
    let filter = TransactionFilter::new().field("type", "transfer");
    for _ in 0..2 {
        ledger.authenticate_pin("alice", "1234").unwrap();
        ledger.authenticate_pin("alice", "9999").unwrap();
        ledger.get_payment_methods("alice").unwrap();
        ledger.track_transactions("alice", &filter, 1, 10).unwrap();
        ledger.track_transactions("bob", &filter, 2, 10).unwrap();
    }
    assert_eq!(format!("{:?}", ledger), snapshot);
    assert_eq!(ledger.transactions(), log.as_slice());
}

#[test]
fn test_rejected_calls_leave_state_untouched() {
    let mut ledger = ledger_with(&["alice", "bob"]);
    ledger.add_funds("alice", amt("100")).unwrap();
    let snapshot = format!("{:?}", ledger);

    assert!(ledger.add_funds("alice", amt("2000000")).is_err());
    assert!(ledger.withdraw_funds("alice", "PT1", amt("10")).is_err());
    assert!(ledger.transfer("alice", "bob", amt("1000")).is_err());
    assert!(ledger.apply_interest(rate("0.5")).is_err());
    assert!(ledger.real_time_update("bob", amt("-1")).is_err());
    assert!(ledger.set_pin("alice", "abc").is_err());

    assert_eq!(format!("{:?}", ledger), snapshot);
}

// ==================== SCENARIOS ====================

#[test]
fn test_integration_workflow() {
    let mut ledger = Ledger::with_clock(TickingClock::default());
    ledger
        .create_account("alice", "alice@email.com", "password123")
        .unwrap();
    ledger
        .create_account("bob", "bob@email.com", "password456")
        .unwrap();

    ledger.set_pin("alice", "1234").unwrap();
    ledger.set_pin("bob", "5678").unwrap();
    assert!(ledger.authenticate_pin("alice", "1234").unwrap());

    ledger.add_funds("alice", amt("1000")).unwrap();
    ledger.add_funds("bob", amt("500")).unwrap();
    ledger.transfer("alice", "bob", amt("300")).unwrap();
    ledger
        .withdraw_funds("bob", "PT500123456789", amt("200"))
        .unwrap();
    assert_eq!(ledger.balance("alice").unwrap(), amt("700"));
    assert_eq!(ledger.balance("bob").unwrap(), amt("600"));

    ledger.apply_interest(rate("0.05")).unwrap();
    assert_eq!(ledger.balance("alice").unwrap(), amt("735"));
    assert_eq!(ledger.balance("bob").unwrap(), amt("630"));

    ledger
        .set_spending_limits("alice", Some(amt("100")), Some(amt("1500")))
        .unwrap();

    let card = PaymentMethod::new("card")
        .with_detail("last4", "4321")
        .with_detail("brand", "Mastercard");
    ledger.add_payment_method("alice", card.clone()).unwrap();
    assert_eq!(ledger.get_payment_methods("alice").unwrap(), &[card]);

    assert_eq!(
        all(&ledger, "alice"),
        vec!["interest", "transfer", "deposit"]
    );
    assert_eq!(ledger.transactions().len(), 6);
    ledger.verify_invariants().unwrap();
}

// ==================== CONCURRENCY ====================

#[test]
fn test_concurrent_transfers_conserve_total() {
    let shared = SharedLedger::new(ledger_with(&["a", "b", "c", "d"]));
    for user in ["a", "b", "c", "d"] {
        shared.add_funds(user, amt("1000")).unwrap();
    }

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let ledger = shared.clone();
            thread::spawn(move || {
                let users = ["a", "b", "c", "d"];
                for i in 0..200 {
                    let from = users[(worker + i) % 4];
                    let to = users[(worker + i + 1) % 4];
                    let _ = ledger.transfer(from, to, Amount::from(((i % 7) + 1) as i64));
                    if i % 50 == 0 {
                        let _ = ledger.apply_interest(rate("0.01"));
                    }
                }
            })
        })
        .collect();

    // Readers must always see a consistent ledger
    for _ in 0..100 {
        shared.verify_invariants().unwrap();
    }
    for handle in handles {
        handle.join().unwrap();
    }

    shared.verify_invariants().unwrap();
    let transfers = shared
        .read(|ledger| {
            ledger
                .transactions()
                .iter()
                .filter(|tx| tx.type_name() == "transfer")
                .count()
        })
        .unwrap();
    assert!(transfers > 0);
}
