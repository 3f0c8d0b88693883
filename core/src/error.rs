use crate::ledger::LedgerError;
use crate::types::{ChannelId, ClientTypeId, TransactionRef};
use std::fmt;
use thiserror::Error;

/// Which ceiling a rejected transaction ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    DailyWithdrawal,
    SingleDeposit,
    CumulativeBalance,
}

impl LimitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyWithdrawal => "daily_withdrawal",
            Self::SingleDeposit => "single_deposit",
            Self::CumulativeBalance => "cumulative_balance",
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("No tier configured for client type {client_type_id} (channel {activation_channel_id:?})")]
    PolicyNotConfigured {
        client_type_id: ClientTypeId,
        activation_channel_id: Option<ChannelId>,
    },

    #[error("Limit exceeded: {0}")]
    LimitExceeded(LimitKind),

    #[error("Transfer approval '{id}' is not pending (status: {status})")]
    InvalidState { id: String, status: String },

    #[error("Transfer approval not found: {0}")]
    NotFound(String),

    #[error("Ledger operation failed: {0}")]
    LedgerUnavailable(#[from] LedgerError),

    /// The hold exists on the ledger but neither the record nor the
    /// compensating release could be confirmed. Operator attention required.
    #[error("Hold {hold_ref} for approval {approval_id} could not be reconciled: {detail}")]
    InternalInconsistency {
        approval_id: String,
        hold_ref: TransactionRef,
        detail: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
