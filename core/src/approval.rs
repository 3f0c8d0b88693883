//! Transfer approval record and its status state machine.

use crate::types::{AccountId, Amount, BankId, ChannelId, ClientTypeId, TransactionRef};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed status machine. The only legal transitions are
/// `SubmittedPendingApproval` to `Approved` or `Rejected`; both are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    SubmittedPendingApproval,
    Approved,
    Rejected,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmittedPendingApproval => "submitted_pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "submitted_pending_approval" => Some(Self::SubmittedPendingApproval),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Whether a record in this status may still leave it.
    pub fn can_transition(&self) -> bool {
        matches!(self, Self::SubmittedPendingApproval)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferType {
    AccountToAccount,
    InterBank,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountToAccount => "account_to_account",
            Self::InterBank => "inter_bank",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "account_to_account" => Some(Self::AccountToAccount),
            "inter_bank" => Some(Self::InterBank),
            _ => None,
        }
    }
}

/// Distinguishes ledger products on either end of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Deposit,
    Loan,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Loan => "loan",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(Self::Deposit),
            "loan" => Some(Self::Loan),
            _ => None,
        }
    }
}

/// One two-phase transfer request. Owned exclusively by the workflow; no
/// other component mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferApproval {
    pub id: String,
    pub amount: Amount,
    pub transfer_type: TransferType,
    pub status: TransferStatus,
    pub from_account_id: AccountId,
    pub from_account_type: AccountType,
    pub from_account_number: String,
    pub to_account_id: AccountId,
    pub to_account_type: AccountType,
    pub to_account_number: String,
    /// Ledger-side hold created at submission. Set exactly once.
    pub hold_transaction_id: TransactionRef,
    /// Set at most once, on approve or reject.
    pub release_transaction_id: Option<TransactionRef>,
    /// Set at most once, on approve only.
    pub withdraw_transaction_id: Option<TransactionRef>,
    pub activation_channel_id: Option<ChannelId>,
    pub to_bank_id: Option<BankId>,
    pub reason: Option<String>,
    pub created_by: String,
    pub created_on: NaiveDate,
}

/// What a caller supplies to `TransferApprovalWorkflow::submit`.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub amount: Amount,
    pub transfer_type: TransferType,
    pub from_account_id: AccountId,
    pub from_account_type: AccountType,
    pub from_account_number: String,
    pub from_client_type_id: ClientTypeId,
    pub to_account_id: AccountId,
    pub to_account_type: AccountType,
    pub to_account_number: String,
    /// Present when the destination is itself a tiered account, in which
    /// case the deposit side is validated too.
    pub to_client_type_id: Option<ClientTypeId>,
    pub activation_channel_id: Option<ChannelId>,
    pub to_bank_id: Option<BankId>,
    pub created_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            TransferStatus::SubmittedPendingApproval,
            TransferStatus::Approved,
            TransferStatus::Rejected,
        ] {
            assert_eq!(TransferStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TransferStatus::from_str("held"), None);
    }

    #[test]
    fn only_pending_records_may_transition() {
        assert!(TransferStatus::SubmittedPendingApproval.can_transition());
        assert!(!TransferStatus::Approved.can_transition());
        assert!(!TransferStatus::Rejected.can_transition());
    }

    #[test]
    fn account_and_transfer_types_round_trip() {
        assert_eq!(
            TransferType::from_str(TransferType::InterBank.as_str()),
            Some(TransferType::InterBank)
        );
        assert_eq!(
            AccountType::from_str(AccountType::Loan.as_str()),
            Some(AccountType::Loan)
        );
        assert_eq!(AccountType::from_str("wallet"), None);
    }
}
