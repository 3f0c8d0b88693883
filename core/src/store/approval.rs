//! Transfer approval table access.

use super::{bad_column, required_amount_col, AuthStore};
use crate::approval::{AccountType, TransferApproval, TransferStatus, TransferType};
use crate::error::CoreResult;
use rusqlite::{params, OptionalExtension, Row};
use std::str::FromStr;

const APPROVAL_COLUMNS: &str = "approval_id, amount, transfer_type, status,
        from_account_id, from_account_type, from_account_number,
        to_account_id, to_account_type, to_account_number,
        hold_transaction_id, release_transaction_id, withdraw_transaction_id,
        activation_channel_id, to_bank_id, reason, created_by, created_on";

impl AuthStore {
    pub fn insert_approval(&self, approval: &TransferApproval) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO transfer_approval (
                approval_id, amount, transfer_type, status,
                from_account_id, from_account_type, from_account_number,
                to_account_id, to_account_type, to_account_number,
                hold_transaction_id, release_transaction_id,
                withdraw_transaction_id, activation_channel_id, to_bank_id,
                reason, created_by, created_on
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                      ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                approval.id,
                approval.amount.to_string(),
                approval.transfer_type.as_str(),
                approval.status.as_str(),
                approval.from_account_id,
                approval.from_account_type.as_str(),
                approval.from_account_number,
                approval.to_account_id,
                approval.to_account_type.as_str(),
                approval.to_account_number,
                approval.hold_transaction_id,
                approval.release_transaction_id,
                approval.withdraw_transaction_id,
                approval.activation_channel_id,
                approval.to_bank_id,
                approval.reason,
                approval.created_by,
                approval.created_on.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn get_approval(&self, id: &str) -> CoreResult<Option<TransferApproval>> {
        let sql = format!(
            "SELECT {APPROVAL_COLUMNS} FROM transfer_approval WHERE approval_id = ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let approval = stmt
            .query_row(params![id], approval_row_mapper)
            .optional()?;
        Ok(approval)
    }

    pub fn approvals_by_status(
        &self,
        status: TransferStatus,
    ) -> CoreResult<Vec<TransferApproval>> {
        let sql = format!(
            "SELECT {APPROVAL_COLUMNS} FROM transfer_approval
             WHERE status = ?1 ORDER BY rowid ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let approvals = stmt
            .query_map(params![status.as_str()], approval_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(approvals)
    }

    pub fn approval_count(&self, status: TransferStatus) -> CoreResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM transfer_approval WHERE status = ?1",
                params![status.as_str()],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Guarded status transition. The UPDATE only fires while the record
    /// still carries `from`, so at most one transition away from the
    /// pending status ever succeeds; `false` means another caller won.
    /// The COALESCEs keep the two release-side references set-once.
    pub fn transition_status(
        &self,
        id: &str,
        from: TransferStatus,
        to: TransferStatus,
        reason: Option<&str>,
        release_ref: Option<&str>,
        withdraw_ref: Option<&str>,
    ) -> CoreResult<bool> {
        let rows = self.conn.execute(
            "UPDATE transfer_approval
             SET status = ?1,
                 reason = ?2,
                 release_transaction_id = COALESCE(release_transaction_id, ?3),
                 withdraw_transaction_id = COALESCE(withdraw_transaction_id, ?4)
             WHERE approval_id = ?5 AND status = ?6",
            params![to.as_str(), reason, release_ref, withdraw_ref, id, from.as_str()],
        )?;
        Ok(rows == 1)
    }

    // ── Failure-injection helpers (tests) ──────────────────────

    /// Drop the approval table so the next insert fails. Lets tests
    /// exercise the compensating-release path of submit.
    pub fn drop_approval_table(&self) -> CoreResult<()> {
        self.conn.execute_batch("DROP TABLE transfer_approval;")?;
        Ok(())
    }
}

fn approval_row_mapper(row: &Row<'_>) -> rusqlite::Result<TransferApproval> {
    let transfer_type_raw: String = row.get(2)?;
    let status_raw: String = row.get(3)?;
    let from_type_raw: String = row.get(5)?;
    let to_type_raw: String = row.get(8)?;
    let created_on_raw: String = row.get(17)?;
    Ok(TransferApproval {
        id: row.get(0)?,
        amount: required_amount_col(row, 1)?,
        transfer_type: TransferType::from_str(&transfer_type_raw)
            .ok_or_else(|| bad_column(2, format!("unknown transfer type '{transfer_type_raw}'")))?,
        status: TransferStatus::from_str(&status_raw)
            .ok_or_else(|| bad_column(3, format!("unknown status '{status_raw}'")))?,
        from_account_id: row.get(4)?,
        from_account_type: AccountType::from_str(&from_type_raw)
            .ok_or_else(|| bad_column(5, format!("unknown account type '{from_type_raw}'")))?,
        from_account_number: row.get(6)?,
        to_account_id: row.get(7)?,
        to_account_type: AccountType::from_str(&to_type_raw)
            .ok_or_else(|| bad_column(8, format!("unknown account type '{to_type_raw}'")))?,
        to_account_number: row.get(9)?,
        hold_transaction_id: row.get(10)?,
        release_transaction_id: row.get(11)?,
        withdraw_transaction_id: row.get(12)?,
        activation_channel_id: row.get(13)?,
        to_bank_id: row.get(14)?,
        reason: row.get(15)?,
        created_by: row.get(16)?,
        created_on: chrono::NaiveDate::from_str(&created_on_raw)
            .map_err(|e| bad_column(17, e.to_string()))?,
    })
}
