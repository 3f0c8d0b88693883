//! Point-in-time account activity for limit evaluation.
//!
//! The snapshot is computed fresh on every policy check and never cached
//! across calls; a stale aggregate would let a caller slip past the
//! daily window.

use crate::error::CoreResult;
use crate::ledger::Ledger;
use crate::types::Amount;
use chrono::NaiveDate;
use std::sync::Arc;

/// Derived view of one account's standing, as of one business date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CumulativeTransactionsSnapshot {
    pub cumulative_withdrawal_today: Amount,
    pub current_balance: Amount,
}

pub trait ActivitySource: Send + Sync {
    fn snapshot(
        &self,
        account_id: &str,
        business_date: NaiveDate,
    ) -> CoreResult<CumulativeTransactionsSnapshot>;
}

/// Production source: thin aggregation over the ledger collaborator.
pub struct LedgerActivityReader {
    ledger: Arc<dyn Ledger>,
}

impl LedgerActivityReader {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }
}

impl ActivitySource for LedgerActivityReader {
    fn snapshot(
        &self,
        account_id: &str,
        business_date: NaiveDate,
    ) -> CoreResult<CumulativeTransactionsSnapshot> {
        let cumulative_withdrawal_today = self
            .ledger
            .cumulative_withdrawals(account_id, business_date)?;
        let current_balance = self.ledger.current_balance(account_id)?;
        Ok(CumulativeTransactionsSnapshot {
            cumulative_withdrawal_today,
            current_balance,
        })
    }
}
