//! gate-runner: headless driver for the funds-movement authorization core.
//!
//! Usage:
//!   gate-runner --db gate.db
//!   gate-runner --config core.json

use anyhow::Result;
use fundsgate_core::{
    activity::LedgerActivityReader,
    approval::{AccountType, TransferRequest, TransferStatus, TransferType},
    clock::{BusinessCalendar, TenantClock},
    config::CoreConfig,
    event::LogSink,
    ledger::InMemoryLedger,
    policy::LimitPolicyEngine,
    store::AuthStore,
    tier::AccountTier,
    workflow::TransferApprovalWorkflow,
};
use rust_decimal::Decimal;
use std::env;
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    // For :memory: use the SQLite shared-memory URI so the workflow and
    // policy connections share the same database.
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].clone())
        .unwrap_or_else(|| "file:gate_demo?mode=memory&cache=shared".to_string());
    let config = match args.windows(2).find(|w| w[0] == "--config") {
        Some(w) => CoreConfig::from_json_file(Path::new(&w[1]))?,
        None => CoreConfig::default(),
    };

    println!("fundsgate gate-runner");
    println!("  db:     {db}");
    println!("  offset: {} min", config.tenant_utc_offset_minutes);
    println!();

    let store = AuthStore::open(&db)?;
    store.migrate()?;
    seed_tiers(&store)?;
    log::debug!("schema migrated and tier tree seeded");

    let ledger = Arc::new(InMemoryLedger::new());
    ledger.open_account("acc-001", Decimal::from(2_500));
    ledger.open_account("acc-002", Decimal::from(800));

    let calendar: Arc<dyn BusinessCalendar> =
        Arc::new(TenantClock::new(config.tenant_utc_offset_minutes));
    let policy = LimitPolicyEngine::new(
        store.reopen()?,
        Box::new(LedgerActivityReader::new(ledger.clone())),
        calendar.clone(),
    );
    let workflow = TransferApprovalWorkflow::new(
        store.reopen()?,
        ledger.clone(),
        policy,
        Arc::new(LogSink),
        calendar,
        config,
    );

    // 1. A transfer the checker waves through.
    let first = workflow.submit(request(500, "maker-01"))?;
    println!(
        "submitted {}  hold={}",
        first.id, first.hold_transaction_id
    );
    let first = workflow.approve(&first.id, "checker-01", "within policy")?;
    println!(
        "approved  {}  release={:?} withdraw={:?}",
        first.id, first.release_transaction_id, first.withdraw_transaction_id
    );

    // 2. A transfer the checker turns down.
    let second = workflow.submit(request(120, "maker-01"))?;
    let second = workflow.reject(&second.id, "checker-02", "beneficiary mismatch")?;
    println!(
        "rejected  {}  release={:?}",
        second.id, second.release_transaction_id
    );

    // 3. One that breaches the daily withdrawal cap.
    match workflow.submit(request(900, "maker-01")) {
        Err(err) => println!("refused   {err}"),
        Ok(approval) => println!("unexpectedly accepted {}", approval.id),
    }

    println!();
    for status in [
        TransferStatus::SubmittedPendingApproval,
        TransferStatus::Approved,
        TransferStatus::Rejected,
    ] {
        let count = workflow.by_status(status)?.len();
        println!("{status}: {count}");
    }
    println!(
        "acc-001 posted={:?} available={:?}",
        ledger.posted_balance("acc-001"),
        ledger.available_balance("acc-001")
    );
    println!(
        "acc-002 posted={:?} available={:?}",
        ledger.posted_balance("acc-002"),
        ledger.available_balance("acc-002")
    );

    Ok(())
}

fn request(amount: i64, maker: &str) -> TransferRequest {
    TransferRequest {
        amount: Decimal::from(amount),
        transfer_type: TransferType::AccountToAccount,
        from_account_id: "acc-001".to_string(),
        from_account_type: AccountType::Deposit,
        from_account_number: "0001-000501".to_string(),
        from_client_type_id: 10,
        to_account_id: "acc-002".to_string(),
        to_account_type: AccountType::Deposit,
        to_account_number: "0001-000502".to_string(),
        to_client_type_id: None,
        activation_channel_id: None,
        to_bank_id: None,
        created_by: maker.to_string(),
    }
}

fn seed_tiers(store: &AuthStore) -> Result<()> {
    store.insert_tier(&AccountTier {
        id: 1,
        name: "individual".to_string(),
        description: Some("default individual tier".to_string()),
        client_type_id: Some(10),
        parent_id: None,
        activation_channel_id: None,
        daily_withdrawal_limit: Some(Decimal::from(1_000)),
        single_deposit_limit: Some(Decimal::from(5_000)),
        cumulative_balance_cap: Some(Decimal::from(100_000)),
    })?;
    store.insert_tier(&AccountTier {
        id: 2,
        name: "individual-agent".to_string(),
        description: Some("agent-activated accounts carry a tighter deposit cap".to_string()),
        client_type_id: None,
        parent_id: Some(1),
        activation_channel_id: Some(3),
        daily_withdrawal_limit: None,
        single_deposit_limit: Some(Decimal::from(200)),
        cumulative_balance_cap: None,
    })?;
    Ok(())
}
