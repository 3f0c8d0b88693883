//! Core configuration: request bounds and the tenant clock offset.

use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Upper bound on account number length accepted at submission.
    #[serde(default = "default_account_number_max_len")]
    pub account_number_max_len: usize,

    /// Upper bound on the approver/rejecter reason text.
    #[serde(default = "default_reason_max_len")]
    pub reason_max_len: usize,

    /// Minutes east of UTC for the tenant's business-date window.
    #[serde(default)]
    pub tenant_utc_offset_minutes: i32,
}

fn default_account_number_max_len() -> usize {
    40
}

fn default_reason_max_len() -> usize {
    500
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            account_number_max_len: default_account_number_max_len(),
            reason_max_len: default_reason_max_len(),
            tenant_utc_offset_minutes: 0,
        }
    }
}

impl CoreConfig {
    pub fn from_json_file(path: &Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.display()))?;
        Ok(serde_json::from_str(&raw)?)
    }
}
