//! Limit policy engine tests.
//!
//! Covers tier inheritance through the parent chain, the daily
//! withdrawal window, both deposit ceilings, and fallback behavior when
//! no channel-specific child tier exists.

use chrono::NaiveDate;
use fundsgate_core::{
    activity::LedgerActivityReader,
    clock::FixedCalendar,
    error::{CoreError, LimitKind},
    ledger::InMemoryLedger,
    policy::LimitPolicyEngine,
    store::AuthStore,
    tier::AccountTier,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

const INDIVIDUAL: i64 = 10;
const AGENT_CHANNEL: i64 = 3;

fn business_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn tier(id: i64, name: &str) -> AccountTier {
    AccountTier {
        id,
        name: name.to_string(),
        description: None,
        client_type_id: None,
        parent_id: None,
        activation_channel_id: None,
        daily_withdrawal_limit: None,
        single_deposit_limit: None,
        cumulative_balance_cap: None,
    }
}

/// Build an engine over the given tiers plus a ledger to seed activity on.
fn build(tiers: Vec<AccountTier>) -> (Arc<InMemoryLedger>, LimitPolicyEngine) {
    let store = AuthStore::in_memory().unwrap();
    store.migrate().unwrap();
    for t in &tiers {
        store.insert_tier(t).unwrap();
    }
    let ledger = Arc::new(InMemoryLedger::with_business_date(business_date()));
    let engine = LimitPolicyEngine::new(
        store,
        Box::new(LedgerActivityReader::new(ledger.clone())),
        Arc::new(FixedCalendar(business_date())),
    );
    (ledger, engine)
}

fn individual_root(daily: Option<Decimal>) -> AccountTier {
    let mut t = tier(1, "individual");
    t.client_type_id = Some(INDIVIDUAL);
    t.daily_withdrawal_limit = daily;
    t
}

/// Root sets dailyWithdrawalLimit=1000; the account already withdrew 800
/// today. A further 300 breaches the window, a further 200 does not.
#[test]
fn daily_withdrawal_window_counts_prior_activity() {
    let (ledger, engine) = build(vec![individual_root(Some(dec!(1000)))]);
    ledger.open_account("acc-1", dec!(10000));
    ledger.post_withdrawal("acc-1", business_date(), dec!(800));

    let err = engine
        .validate("acc-1", INDIVIDUAL, None, dec!(-300))
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::LimitExceeded(LimitKind::DailyWithdrawal)
    ));

    engine
        .validate("acc-1", INDIVIDUAL, None, dec!(-200))
        .unwrap();
}

/// Landing exactly on the cap is still allowed; only exceeding it fails.
#[test]
fn withdrawal_to_the_exact_cap_is_allowed() {
    let (ledger, engine) = build(vec![individual_root(Some(dec!(1000)))]);
    ledger.open_account("acc-1", dec!(10000));
    ledger.post_withdrawal("acc-1", business_date(), dec!(999));

    engine.validate("acc-1", INDIVIDUAL, None, dec!(-1)).unwrap();
    assert!(engine
        .validate("acc-1", INDIVIDUAL, None, dec!(-1.01))
        .is_err());
}

/// Only the root defines the daily limit; a grandchild tier two levels
/// down still resolves to the root's value.
#[test]
fn daily_limit_is_inherited_through_the_chain() {
    let mut mid = tier(2, "individual-digital");
    mid.parent_id = Some(1);
    let mut leaf = tier(3, "individual-digital-agent");
    leaf.parent_id = Some(2);
    leaf.activation_channel_id = Some(AGENT_CHANNEL);

    let (ledger, engine) = build(vec![individual_root(Some(dec!(1000))), mid, leaf]);
    ledger.open_account("acc-1", dec!(10000));
    ledger.post_withdrawal("acc-1", business_date(), dec!(800));

    let err = engine
        .validate("acc-1", INDIVIDUAL, Some(AGENT_CHANNEL), dec!(-300))
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::LimitExceeded(LimitKind::DailyWithdrawal)
    ));
    engine
        .validate("acc-1", INDIVIDUAL, Some(AGENT_CHANNEL), dec!(-200))
        .unwrap();
}

/// Child defines only singleDepositLimit=200. A 250 deposit trips it; a
/// 150 deposit falls through to the cumulative-balance cap inherited
/// from the root.
#[test]
fn child_deposit_cap_then_inherited_balance_cap() {
    let mut root = individual_root(None);
    root.cumulative_balance_cap = Some(dec!(300));
    let mut child = tier(2, "individual-agent");
    child.parent_id = Some(1);
    child.activation_channel_id = Some(AGENT_CHANNEL);
    child.single_deposit_limit = Some(dec!(200));

    let (ledger, engine) = build(vec![root, child]);
    ledger.open_account("acc-1", dec!(200));

    let err = engine
        .validate("acc-1", INDIVIDUAL, Some(AGENT_CHANNEL), dec!(250))
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::LimitExceeded(LimitKind::SingleDeposit)
    ));

    // 150 clears the deposit cap but lands on balance 200 + 150 > 300.
    let err = engine
        .validate("acc-1", INDIVIDUAL, Some(AGENT_CHANNEL), dec!(150))
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::LimitExceeded(LimitKind::CumulativeBalance)
    ));

    engine
        .validate("acc-1", INDIVIDUAL, Some(AGENT_CHANNEL), dec!(50))
        .unwrap();
}

/// An unknown channel falls back to the client type's root tier.
#[test]
fn unknown_channel_falls_back_to_the_root_tier() {
    let mut root = individual_root(None);
    root.single_deposit_limit = Some(dec!(500));
    let (ledger, engine) = build(vec![root]);
    ledger.open_account("acc-1", dec!(0));

    let err = engine
        .validate("acc-1", INDIVIDUAL, Some(99), dec!(600))
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::LimitExceeded(LimitKind::SingleDeposit)
    ));
}

#[test]
fn zero_amount_is_always_allowed() {
    // No tiers, no accounts: a zero movement never consults either.
    let (_ledger, engine) = build(vec![]);
    engine.validate("acc-1", INDIVIDUAL, None, dec!(0)).unwrap();
}

#[test]
fn missing_tier_configuration_is_reported_as_such() {
    let (ledger, engine) = build(vec![individual_root(None)]);
    ledger.open_account("acc-1", dec!(0));
    let err = engine.validate("acc-1", 77, None, dec!(10)).unwrap_err();
    assert!(matches!(err, CoreError::PolicyNotConfigured { .. }));
}

/// If amount X passes, every smaller amount in the same direction passes
/// against the same activity snapshot.
#[test]
fn allowed_amounts_are_downward_closed() {
    let (ledger, engine) = build(vec![individual_root(Some(dec!(1000)))]);
    ledger.open_account("acc-1", dec!(10000));
    ledger.post_withdrawal("acc-1", business_date(), dec!(600));

    engine
        .validate("acc-1", INDIVIDUAL, None, dec!(-400))
        .unwrap();
    for smaller in [dec!(-399), dec!(-250), dec!(-100), dec!(-1), dec!(-0.01)] {
        engine
            .validate("acc-1", INDIVIDUAL, None, smaller)
            .unwrap();
    }
}

/// A tier chain that defines no value for a field leaves it
/// unconstrained.
#[test]
fn undefined_limits_do_not_constrain() {
    let (ledger, engine) = build(vec![individual_root(None)]);
    ledger.open_account("acc-1", dec!(1_000_000));

    engine
        .validate("acc-1", INDIVIDUAL, None, dec!(-900000))
        .unwrap();
    engine
        .validate("acc-1", INDIVIDUAL, None, dec!(900000))
        .unwrap();
}

/// Ledger failures reach the caller as wrapped ledger errors, not as
/// policy decisions.
#[test]
fn unknown_account_surfaces_as_a_ledger_error() {
    let (_ledger, engine) = build(vec![individual_root(Some(dec!(1000)))]);
    let err = engine
        .validate("ghost", INDIVIDUAL, None, dec!(-10))
        .unwrap_err();
    assert!(matches!(err, CoreError::LedgerUnavailable(_)));
}
