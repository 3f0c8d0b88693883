//! Ledger collaborator seam.
//!
//! The ledger owns the money. A hold is the atomic reservation gate
//! against an account's available balance; release and execute are
//! idempotent keyed by the hold reference so caller retries are safe.
//! Policy validation upstream is only a fast pre-check.

use crate::types::{AccountId, Amount, TransactionRef};
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Unknown account: {0}")]
    UnknownAccount(AccountId),

    #[error("Unknown hold: {0}")]
    UnknownHold(TransactionRef),

    #[error("Insufficient available funds on account {0}")]
    InsufficientFunds(AccountId),

    #[error("Hold {0} was already released without execution")]
    HoldReleased(TransactionRef),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

pub trait Ledger: Send + Sync {
    /// Reserve `amount` against the account's available balance.
    /// Must atomically re-check available funds.
    fn hold(&self, account_id: &str, amount: Amount) -> Result<TransactionRef, LedgerError>;

    /// Release the hold and, as one unit, execute the debit from the
    /// source and the credit to the destination.
    fn release_and_execute(
        &self,
        hold_ref: &str,
        to_account_id: &str,
    ) -> Result<(TransactionRef, TransactionRef), LedgerError>;

    /// Release the hold with no execution; the funds become available
    /// again on the source account.
    fn release(&self, hold_ref: &str) -> Result<TransactionRef, LedgerError>;

    /// Settled balance at evaluation time.
    fn current_balance(&self, account_id: &str) -> Result<Amount, LedgerError>;

    /// Sum of withdrawal-type postings for the given business date.
    fn cumulative_withdrawals(
        &self,
        account_id: &str,
        business_date: NaiveDate,
    ) -> Result<Amount, LedgerError>;
}

// ── In-memory implementation ───────────────────────────────────────

#[derive(Debug, Clone)]
struct AccountState {
    posted_balance: Amount,
    available_balance: Amount,
}

#[derive(Debug, Clone)]
enum HoldOutcome {
    Released {
        release_ref: TransactionRef,
    },
    Executed {
        release_ref: TransactionRef,
        withdraw_ref: TransactionRef,
    },
}

#[derive(Debug, Clone)]
struct HoldState {
    account_id: AccountId,
    amount: Amount,
    outcome: Option<HoldOutcome>,
}

#[derive(Debug, Default)]
struct Book {
    accounts: HashMap<AccountId, AccountState>,
    holds: HashMap<TransactionRef, HoldState>,
    withdrawals: HashMap<(AccountId, NaiveDate), Amount>,
}

/// Account book with posted/available balances and a hold table. Used by
/// gate-runner and the test suites; deployments plug in their own impl.
pub struct InMemoryLedger {
    book: Mutex<Book>,
    today: NaiveDate,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_business_date(Utc::now().date_naive())
    }

    /// Pin the date executed withdrawals are recorded under.
    pub fn with_business_date(today: NaiveDate) -> Self {
        Self {
            book: Mutex::new(Book::default()),
            today,
        }
    }

    fn book(&self) -> MutexGuard<'_, Book> {
        self.book.lock().expect("ledger state poisoned")
    }

    pub fn open_account(&self, account_id: &str, opening_balance: Amount) {
        self.book().accounts.insert(
            account_id.to_string(),
            AccountState {
                posted_balance: opening_balance,
                available_balance: opening_balance,
            },
        );
    }

    pub fn posted_balance(&self, account_id: &str) -> Option<Amount> {
        self.book().accounts.get(account_id).map(|a| a.posted_balance)
    }

    pub fn available_balance(&self, account_id: &str) -> Option<Amount> {
        self.book()
            .accounts
            .get(account_id)
            .map(|a| a.available_balance)
    }

    pub fn active_hold_count(&self) -> usize {
        self.book()
            .holds
            .values()
            .filter(|h| h.outcome.is_none())
            .count()
    }

    /// Post a settled withdrawal directly, bypassing the hold lifecycle.
    /// Seeds prior activity for limit evaluation.
    pub fn post_withdrawal(&self, account_id: &str, date: NaiveDate, amount: Amount) {
        let mut book = self.book();
        if let Some(account) = book.accounts.get_mut(account_id) {
            account.posted_balance -= amount;
            account.available_balance -= amount;
        }
        *book
            .withdrawals
            .entry((account_id.to_string(), date))
            .or_insert(Amount::ZERO) += amount;
    }

    fn next_ref(prefix: &str) -> TransactionRef {
        format!("{prefix}-{}", Uuid::new_v4())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for InMemoryLedger {
    fn hold(&self, account_id: &str, amount: Amount) -> Result<TransactionRef, LedgerError> {
        if amount <= Amount::ZERO {
            return Err(LedgerError::Unavailable(format!(
                "non-positive hold amount {amount}"
            )));
        }
        let mut book = self.book();
        {
            let account = book
                .accounts
                .get_mut(account_id)
                .ok_or_else(|| LedgerError::UnknownAccount(account_id.to_string()))?;
            if account.available_balance < amount {
                return Err(LedgerError::InsufficientFunds(account_id.to_string()));
            }
            account.available_balance -= amount;
        }
        let hold_ref = Self::next_ref("hold");
        book.holds.insert(
            hold_ref.clone(),
            HoldState {
                account_id: account_id.to_string(),
                amount,
                outcome: None,
            },
        );
        Ok(hold_ref)
    }

    fn release_and_execute(
        &self,
        hold_ref: &str,
        to_account_id: &str,
    ) -> Result<(TransactionRef, TransactionRef), LedgerError> {
        let mut book = self.book();
        let hold = book
            .holds
            .get(hold_ref)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownHold(hold_ref.to_string()))?;
        match hold.outcome {
            Some(HoldOutcome::Executed {
                release_ref,
                withdraw_ref,
            }) => Ok((release_ref, withdraw_ref)),
            Some(HoldOutcome::Released { .. }) => {
                Err(LedgerError::HoldReleased(hold_ref.to_string()))
            }
            None => {
                // The hold already reduced available_balance; consuming it
                // debits posted and leaves available as-is.
                if let Some(source) = book.accounts.get_mut(&hold.account_id) {
                    source.posted_balance -= hold.amount;
                }
                if let Some(dest) = book.accounts.get_mut(to_account_id) {
                    dest.posted_balance += hold.amount;
                    dest.available_balance += hold.amount;
                }
                *book
                    .withdrawals
                    .entry((hold.account_id.clone(), self.today))
                    .or_insert(Amount::ZERO) += hold.amount;
                let release_ref = Self::next_ref("rel");
                let withdraw_ref = Self::next_ref("wdr");
                if let Some(state) = book.holds.get_mut(hold_ref) {
                    state.outcome = Some(HoldOutcome::Executed {
                        release_ref: release_ref.clone(),
                        withdraw_ref: withdraw_ref.clone(),
                    });
                }
                Ok((release_ref, withdraw_ref))
            }
        }
    }

    fn release(&self, hold_ref: &str) -> Result<TransactionRef, LedgerError> {
        let mut book = self.book();
        let hold = book
            .holds
            .get(hold_ref)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownHold(hold_ref.to_string()))?;
        match hold.outcome {
            Some(HoldOutcome::Released { release_ref })
            | Some(HoldOutcome::Executed { release_ref, .. }) => Ok(release_ref),
            None => {
                if let Some(account) = book.accounts.get_mut(&hold.account_id) {
                    account.available_balance += hold.amount;
                }
                let release_ref = Self::next_ref("rel");
                if let Some(state) = book.holds.get_mut(hold_ref) {
                    state.outcome = Some(HoldOutcome::Released {
                        release_ref: release_ref.clone(),
                    });
                }
                Ok(release_ref)
            }
        }
    }

    fn current_balance(&self, account_id: &str) -> Result<Amount, LedgerError> {
        self.book()
            .accounts
            .get(account_id)
            .map(|a| a.posted_balance)
            .ok_or_else(|| LedgerError::UnknownAccount(account_id.to_string()))
    }

    fn cumulative_withdrawals(
        &self,
        account_id: &str,
        business_date: NaiveDate,
    ) -> Result<Amount, LedgerError> {
        let book = self.book();
        if !book.accounts.contains_key(account_id) {
            return Err(LedgerError::UnknownAccount(account_id.to_string()));
        }
        Ok(book
            .withdrawals
            .get(&(account_id.to_string(), business_date))
            .copied()
            .unwrap_or(Amount::ZERO))
    }
}
