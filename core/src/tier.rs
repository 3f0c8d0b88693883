//! Account tier hierarchy and limit inheritance.
//!
//! Tiers form a forest. A root carries a client type; children narrow a
//! root by activation channel and inherit the client type from the root.
//! A limit left unset on a tier resolves to the nearest ancestor that
//! defines one; a chain with no value at all leaves that limit
//! unconstrained.
//!
//! RULE: configuration errors (missing root client type, duplicate
//! channel among siblings, unknown parent) are rejected when the tier is
//! written, never at transaction time.

use crate::error::{CoreError, CoreResult};
use crate::types::{Amount, ChannelId, ClientTypeId, TierId};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct AccountTier {
    pub id: TierId,
    pub name: String,
    pub description: Option<String>,
    /// Set on roots only; children inherit it from their root.
    pub client_type_id: Option<ClientTypeId>,
    pub parent_id: Option<TierId>,
    pub activation_channel_id: Option<ChannelId>,
    pub daily_withdrawal_limit: Option<Amount>,
    pub single_deposit_limit: Option<Amount>,
    pub cumulative_balance_cap: Option<Amount>,
}

/// The three ceilings after inheritance has been applied.
/// `None` means the axis is unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolvedLimits {
    pub daily_withdrawal_limit: Option<Amount>,
    pub single_deposit_limit: Option<Amount>,
    pub cumulative_balance_cap: Option<Amount>,
}

/// In-memory arena of tier records keyed by id. Parent links are plain
/// id references; inheritance is resolved by iterative lookup.
#[derive(Debug, Default)]
pub struct TierTree {
    tiers: HashMap<TierId, AccountTier>,
}

impl TierTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a tree from persisted rows, which may arrive in any order.
    /// Rows whose parent never materializes (unknown id or a cycle) are a
    /// configuration error.
    pub fn from_rows(rows: Vec<AccountTier>) -> CoreResult<Self> {
        let mut tree = Self::new();
        let mut pending = rows;
        while !pending.is_empty() {
            let before = pending.len();
            let (ready, rest): (Vec<_>, Vec<_>) = pending.into_iter().partition(|t| {
                t.parent_id.map_or(true, |p| tree.tiers.contains_key(&p))
            });
            for tier in ready {
                tree.insert(tier)?;
            }
            pending = rest;
            if pending.len() == before {
                let ids: Vec<TierId> = pending.iter().map(|t| t.id).collect();
                return Err(CoreError::Validation(format!(
                    "tier rows with unresolvable parent links: {ids:?}"
                )));
            }
        }
        Ok(tree)
    }

    /// Add a tier, enforcing the structural invariants. Parents must be
    /// inserted before children, so a new node can never introduce a cycle.
    pub fn insert(&mut self, tier: AccountTier) -> CoreResult<()> {
        if self.tiers.contains_key(&tier.id) {
            return Err(CoreError::Validation(format!(
                "tier id {} already exists",
                tier.id
            )));
        }
        if self.tiers.values().any(|t| t.name == tier.name) {
            return Err(CoreError::Validation(format!(
                "tier name '{}' already exists",
                tier.name
            )));
        }
        for (label, value) in [
            ("daily_withdrawal_limit", tier.daily_withdrawal_limit),
            ("single_deposit_limit", tier.single_deposit_limit),
            ("cumulative_balance_cap", tier.cumulative_balance_cap),
        ] {
            if let Some(v) = value {
                if v < Amount::ZERO {
                    return Err(CoreError::Validation(format!(
                        "tier '{}': {label} must be non-negative",
                        tier.name
                    )));
                }
            }
        }
        match tier.parent_id {
            None => {
                if tier.client_type_id.is_none() {
                    return Err(CoreError::Validation(format!(
                        "root tier '{}' must carry a client type",
                        tier.name
                    )));
                }
            }
            Some(parent_id) => {
                // 0 is not a root sentinel; it is an unknown parent.
                if !self.tiers.contains_key(&parent_id) {
                    return Err(CoreError::Validation(format!(
                        "tier '{}' references unknown parent {parent_id}",
                        tier.name
                    )));
                }
                if tier.client_type_id.is_some() {
                    return Err(CoreError::Validation(format!(
                        "child tier '{}' inherits its client type from the parent",
                        tier.name
                    )));
                }
                if let Some(channel) = tier.activation_channel_id {
                    let duplicate = self.tiers.values().any(|t| {
                        t.parent_id == Some(parent_id)
                            && t.activation_channel_id == Some(channel)
                    });
                    if duplicate {
                        return Err(CoreError::Validation(format!(
                            "tier '{}': channel {channel} already used by a sibling",
                            tier.name
                        )));
                    }
                }
            }
        }
        self.tiers.insert(tier.id, tier);
        Ok(())
    }

    pub fn get(&self, id: TierId) -> Option<&AccountTier> {
        self.tiers.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccountTier> {
        self.tiers.values()
    }

    /// The client type a tier belongs to: its root's `client_type_id`.
    pub fn effective_client_type(&self, id: TierId) -> Option<ClientTypeId> {
        let mut current = self.tiers.get(&id)?;
        let mut hops = 0usize;
        loop {
            match current.parent_id {
                None => return current.client_type_id,
                Some(parent_id) => {
                    current = self.tiers.get(&parent_id)?;
                    hops += 1;
                    if hops > self.tiers.len() {
                        return None;
                    }
                }
            }
        }
    }

    /// Resolve the effective limits for a client type and optional
    /// channel. A channel-specific child wins when one exists; otherwise
    /// the client type's root applies.
    pub fn resolve(
        &self,
        client_type_id: ClientTypeId,
        activation_channel_id: Option<ChannelId>,
    ) -> CoreResult<ResolvedLimits> {
        let tier = activation_channel_id
            .and_then(|channel| self.channel_tier(client_type_id, channel))
            .or_else(|| self.root_tier(client_type_id))
            .ok_or(CoreError::PolicyNotConfigured {
                client_type_id,
                activation_channel_id,
            })?;
        Ok(ResolvedLimits {
            daily_withdrawal_limit: self.inherited(tier.id, |t| t.daily_withdrawal_limit),
            single_deposit_limit: self.inherited(tier.id, |t| t.single_deposit_limit),
            cumulative_balance_cap: self.inherited(tier.id, |t| t.cumulative_balance_cap),
        })
    }

    fn root_tier(&self, client_type_id: ClientTypeId) -> Option<&AccountTier> {
        self.tiers
            .values()
            .find(|t| t.parent_id.is_none() && t.client_type_id == Some(client_type_id))
    }

    fn channel_tier(
        &self,
        client_type_id: ClientTypeId,
        channel: ChannelId,
    ) -> Option<&AccountTier> {
        // Lowest id wins if the same channel appears at several depths,
        // keeping resolution deterministic.
        self.tiers
            .values()
            .filter(|t| {
                t.activation_channel_id == Some(channel)
                    && self.effective_client_type(t.id) == Some(client_type_id)
            })
            .min_by_key(|t| t.id)
    }

    /// Walk from `start` toward the root until a tier defines the field.
    fn inherited(
        &self,
        start: TierId,
        field: impl Fn(&AccountTier) -> Option<Amount>,
    ) -> Option<Amount> {
        let mut current = self.tiers.get(&start);
        let mut hops = 0usize;
        while let Some(tier) = current {
            if let Some(value) = field(tier) {
                return Some(value);
            }
            current = tier.parent_id.and_then(|p| self.tiers.get(&p));
            hops += 1;
            if hops > self.tiers.len() {
                return None;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn root(id: TierId, name: &str, client_type: ClientTypeId) -> AccountTier {
        AccountTier {
            id,
            name: name.to_string(),
            description: None,
            client_type_id: Some(client_type),
            parent_id: None,
            activation_channel_id: None,
            daily_withdrawal_limit: None,
            single_deposit_limit: None,
            cumulative_balance_cap: None,
        }
    }

    fn child(id: TierId, name: &str, parent: TierId, channel: Option<ChannelId>) -> AccountTier {
        AccountTier {
            id,
            name: name.to_string(),
            description: None,
            client_type_id: None,
            parent_id: Some(parent),
            activation_channel_id: channel,
            daily_withdrawal_limit: None,
            single_deposit_limit: None,
            cumulative_balance_cap: None,
        }
    }

    #[test]
    fn root_without_client_type_is_rejected() {
        let mut tree = TierTree::new();
        let mut tier = root(1, "individual", 10);
        tier.client_type_id = None;
        let err = tree.insert(tier).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn parent_zero_is_an_unknown_parent_not_a_root_marker() {
        let mut tree = TierTree::new();
        tree.insert(root(1, "individual", 10)).unwrap();
        let mut tier = child(2, "agent", 1, Some(3));
        tier.parent_id = Some(0);
        let err = tree.insert(tier).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn duplicate_channel_among_siblings_is_rejected() {
        let mut tree = TierTree::new();
        tree.insert(root(1, "individual", 10)).unwrap();
        tree.insert(child(2, "agent", 1, Some(3))).unwrap();
        let err = tree.insert(child(3, "agent-dup", 1, Some(3))).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn same_channel_under_different_parents_is_fine() {
        let mut tree = TierTree::new();
        tree.insert(root(1, "individual", 10)).unwrap();
        tree.insert(root(2, "merchant", 20)).unwrap();
        tree.insert(child(3, "ind-agent", 1, Some(3))).unwrap();
        tree.insert(child(4, "mer-agent", 2, Some(3))).unwrap();
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn child_declaring_a_client_type_is_rejected() {
        let mut tree = TierTree::new();
        tree.insert(root(1, "individual", 10)).unwrap();
        let mut tier = child(2, "odd", 1, None);
        tier.client_type_id = Some(20);
        assert!(tree.insert(tier).is_err());
    }

    #[test]
    fn negative_limit_is_rejected() {
        let mut tree = TierTree::new();
        let mut tier = root(1, "individual", 10);
        tier.daily_withdrawal_limit = Some(dec!(-1));
        assert!(tree.insert(tier).is_err());
    }

    #[test]
    fn from_rows_tolerates_children_before_parents() {
        let rows = vec![child(2, "agent", 1, Some(3)), root(1, "individual", 10)];
        let tree = TierTree::from_rows(rows).unwrap();
        assert_eq!(tree.effective_client_type(2), Some(10));
    }

    #[test]
    fn from_rows_rejects_a_parent_cycle() {
        let mut a = child(1, "a", 2, None);
        a.parent_id = Some(2);
        let mut b = child(2, "b", 1, None);
        b.parent_id = Some(1);
        let err = TierTree::from_rows(vec![a, b]).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn limits_resolve_through_a_deep_chain() {
        let mut tree = TierTree::new();
        let mut r = root(1, "individual", 10);
        r.daily_withdrawal_limit = Some(dec!(1000));
        tree.insert(r).unwrap();
        tree.insert(child(2, "mid", 1, None)).unwrap();
        tree.insert(child(3, "leaf", 2, Some(7))).unwrap();

        let limits = tree.resolve(10, Some(7)).unwrap();
        assert_eq!(limits.daily_withdrawal_limit, Some(dec!(1000)));
        assert_eq!(limits.single_deposit_limit, None);
    }

    #[test]
    fn channel_miss_falls_back_to_the_root() {
        let mut tree = TierTree::new();
        let mut r = root(1, "individual", 10);
        r.single_deposit_limit = Some(dec!(500));
        tree.insert(r).unwrap();

        let limits = tree.resolve(10, Some(99)).unwrap();
        assert_eq!(limits.single_deposit_limit, Some(dec!(500)));
    }

    #[test]
    fn child_value_overrides_the_root_value() {
        let mut tree = TierTree::new();
        let mut r = root(1, "individual", 10);
        r.single_deposit_limit = Some(dec!(500));
        tree.insert(r).unwrap();
        let mut c = child(2, "agent", 1, Some(3));
        c.single_deposit_limit = Some(dec!(200));
        tree.insert(c).unwrap();

        let limits = tree.resolve(10, Some(3)).unwrap();
        assert_eq!(limits.single_deposit_limit, Some(dec!(200)));
    }

    #[test]
    fn unknown_client_type_is_policy_not_configured() {
        let tree = TierTree::new();
        let err = tree.resolve(42, None).unwrap_err();
        assert!(matches!(err, CoreError::PolicyNotConfigured { .. }));
    }
}
