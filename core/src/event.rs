//! Audit events emitted on state transitions.
//!
//! RULE: notification is fire-and-forget. A sink failure is logged and
//! swallowed; it never rolls back or blocks a transition.

use crate::types::{AccountId, Amount, TransactionRef};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    TransferSubmitted {
        approval_id: String,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Amount,
        hold_transaction_id: TransactionRef,
    },
    TransferApproved {
        approval_id: String,
        approved_by: String,
        release_transaction_id: TransactionRef,
        withdraw_transaction_id: TransactionRef,
    },
    TransferRejected {
        approval_id: String,
        rejected_by: String,
        release_transaction_id: TransactionRef,
        reason: Option<String>,
    },
}

impl AuditEvent {
    /// Stable string name, used in log lines and sink payload routing.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TransferSubmitted { .. } => "transfer_submitted",
            Self::TransferApproved { .. } => "transfer_approved",
            Self::TransferRejected { .. } => "transfer_rejected",
        }
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &AuditEvent) -> anyhow::Result<()>;
}

/// Default sink: serialize the event and write it to the log.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, event: &AuditEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(event)?;
        log::info!("audit {}: {payload}", event.event_type());
        Ok(())
    }
}

/// Test sink that retains every event it sees.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("sink state poisoned").clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: &AuditEvent) -> anyhow::Result<()> {
        self.events
            .lock()
            .expect("sink state poisoned")
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = AuditEvent::TransferSubmitted {
            approval_id: "ap-1".into(),
            from_account_id: "acc-a".into(),
            to_account_id: "acc-b".into(),
            amount: dec!(125.50),
            hold_transaction_id: "hold-1".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"transfer_submitted""#));
        assert!(json.contains(r#""amount":"125.50""#));
    }

    #[test]
    fn recording_sink_retains_events_in_order() {
        let sink = RecordingSink::new();
        sink.notify(&AuditEvent::TransferApproved {
            approval_id: "ap-1".into(),
            approved_by: "teller".into(),
            release_transaction_id: "rel-1".into(),
            withdraw_transaction_id: "wdr-1".into(),
        })
        .unwrap();
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "transfer_approved");
    }
}
