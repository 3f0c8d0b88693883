//! Tier table access.

use super::{amount_col, AuthStore};
use crate::error::{CoreError, CoreResult};
use crate::tier::{AccountTier, TierTree};
use crate::types::TierId;
use rusqlite::{params, OptionalExtension, Row};

impl AuthStore {
    /// Persist a tier after validating it against the current tree.
    /// Structural problems (missing root client type, duplicate sibling
    /// channel, unknown parent) are configuration errors caught here,
    /// not at transaction time.
    pub fn insert_tier(&self, tier: &AccountTier) -> CoreResult<()> {
        let mut tree = self.load_tier_tree()?;
        tree.insert(tier.clone())?;
        self.conn.execute(
            "INSERT INTO account_tier (
                tier_id, name, description, client_type_id, parent_id,
                activation_channel_id, daily_withdrawal_limit,
                single_deposit_limit, cumulative_balance_cap
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                tier.id,
                tier.name,
                tier.description,
                tier.client_type_id,
                tier.parent_id,
                tier.activation_channel_id,
                tier.daily_withdrawal_limit.map(|a| a.to_string()),
                tier.single_deposit_limit.map(|a| a.to_string()),
                tier.cumulative_balance_cap.map(|a| a.to_string()),
            ],
        )?;
        Ok(())
    }

    /// Load the whole tier forest as an arena snapshot.
    pub fn load_tier_tree(&self) -> CoreResult<TierTree> {
        let mut stmt = self.conn.prepare(
            "SELECT tier_id, name, description, client_type_id, parent_id,
                    activation_channel_id, daily_withdrawal_limit,
                    single_deposit_limit, cumulative_balance_cap
             FROM account_tier ORDER BY tier_id ASC",
        )?;
        let rows = stmt
            .query_map([], tier_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        TierTree::from_rows(rows)
    }

    pub fn tier_by_name(&self, name: &str) -> CoreResult<Option<AccountTier>> {
        let mut stmt = self.conn.prepare(
            "SELECT tier_id, name, description, client_type_id, parent_id,
                    activation_channel_id, daily_withdrawal_limit,
                    single_deposit_limit, cumulative_balance_cap
             FROM account_tier WHERE name = ?1",
        )?;
        let tier = stmt.query_row(params![name], tier_row_mapper).optional()?;
        Ok(tier)
    }

    /// Remove a tier. Refused while children still reference it.
    pub fn delete_tier(&self, id: TierId) -> CoreResult<()> {
        let children: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM account_tier WHERE parent_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if children > 0 {
            return Err(CoreError::Validation(format!(
                "tier {id} still has {children} child tier(s)"
            )));
        }
        let rows = self
            .conn
            .execute("DELETE FROM account_tier WHERE tier_id = ?1", params![id])?;
        if rows == 0 {
            return Err(CoreError::NotFound(format!("tier {id}")));
        }
        Ok(())
    }
}

fn tier_row_mapper(row: &Row<'_>) -> rusqlite::Result<AccountTier> {
    Ok(AccountTier {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        client_type_id: row.get(3)?,
        parent_id: row.get(4)?,
        activation_channel_id: row.get(5)?,
        daily_withdrawal_limit: amount_col(row, 6)?,
        single_deposit_limit: amount_col(row, 7)?,
        cumulative_balance_cap: amount_col(row, 8)?,
    })
}
