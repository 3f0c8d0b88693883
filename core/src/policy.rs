//! Limit policy evaluation.
//!
//! Validation is a fast pre-check over a point-in-time snapshot. Two
//! concurrent submissions can both pass against a limit they jointly
//! exceed; the ledger hold is the atomic gate that closes that race.

use crate::activity::ActivitySource;
use crate::clock::BusinessCalendar;
use crate::error::{CoreError, CoreResult, LimitKind};
use crate::store::AuthStore;
use crate::types::{Amount, ChannelId, ClientTypeId};
use std::sync::Arc;

pub struct LimitPolicyEngine {
    tiers: AuthStore,
    activity: Box<dyn ActivitySource>,
    calendar: Arc<dyn BusinessCalendar>,
}

impl LimitPolicyEngine {
    pub fn new(
        tiers: AuthStore,
        activity: Box<dyn ActivitySource>,
        calendar: Arc<dyn BusinessCalendar>,
    ) -> Self {
        Self {
            tiers,
            activity,
            calendar,
        }
    }

    /// Decide whether a proposed transaction is permitted. The sign of
    /// `amount` carries the direction: positive is a deposit, negative a
    /// withdrawal. Read-only; safe to call repeatedly and concurrently.
    pub fn validate(
        &self,
        account_id: &str,
        client_type_id: ClientTypeId,
        activation_channel_id: Option<ChannelId>,
        amount: Amount,
    ) -> CoreResult<()> {
        if amount.is_zero() {
            return Ok(());
        }

        let tree = self.tiers.load_tier_tree()?;
        let limits = tree.resolve(client_type_id, activation_channel_id)?;
        // Fresh snapshot on every check; caching here would let a caller
        // slip past the daily window.
        let snapshot = self
            .activity
            .snapshot(account_id, self.calendar.business_date())?;

        if amount < Amount::ZERO {
            let outflow = amount.abs();
            if let Some(cap) = limits.daily_withdrawal_limit {
                if snapshot.cumulative_withdrawal_today + outflow > cap {
                    log::debug!(
                        "account {account_id}: withdrawal {outflow} + {} today exceeds {cap}",
                        snapshot.cumulative_withdrawal_today
                    );
                    return Err(CoreError::LimitExceeded(LimitKind::DailyWithdrawal));
                }
            }
        } else {
            if let Some(cap) = limits.single_deposit_limit {
                if amount > cap {
                    log::debug!("account {account_id}: deposit {amount} exceeds {cap}");
                    return Err(CoreError::LimitExceeded(LimitKind::SingleDeposit));
                }
            }
            if let Some(cap) = limits.cumulative_balance_cap {
                if snapshot.current_balance + amount > cap {
                    log::debug!(
                        "account {account_id}: balance {} + deposit {amount} exceeds {cap}",
                        snapshot.current_balance
                    );
                    return Err(CoreError::LimitExceeded(LimitKind::CumulativeBalance));
                }
            }
        }
        Ok(())
    }
}
