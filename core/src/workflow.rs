//! Transfer approval workflow: the two-phase money movement.
//!
//! Submit validates, places the ledger hold, then persists the record.
//! Hold creation and record persistence are not one atomic unit, so a
//! failed persist triggers the one compensating action in this core: a
//! release of the fresh hold.
//!
//! Approve and reject are serialized per record. The store write lock is
//! taken before the status gate is re-checked, so of any number of
//! concurrent transition attempts exactly one wins; the rest observe the
//! terminal status and fail with InvalidState. The ledger side is
//! idempotent keyed by the hold reference, which makes caller retries
//! after transient failures safe.

use crate::approval::{TransferApproval, TransferRequest, TransferStatus, TransferType};
use crate::clock::BusinessCalendar;
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::event::{AuditEvent, NotificationSink};
use crate::ledger::Ledger;
use crate::policy::LimitPolicyEngine;
use crate::store::AuthStore;
use crate::types::Amount;
use std::sync::Arc;
use uuid::Uuid;

pub struct TransferApprovalWorkflow {
    store: AuthStore,
    ledger: Arc<dyn Ledger>,
    policy: LimitPolicyEngine,
    sink: Arc<dyn NotificationSink>,
    calendar: Arc<dyn BusinessCalendar>,
    config: CoreConfig,
}

impl TransferApprovalWorkflow {
    pub fn new(
        store: AuthStore,
        ledger: Arc<dyn Ledger>,
        policy: LimitPolicyEngine,
        sink: Arc<dyn NotificationSink>,
        calendar: Arc<dyn BusinessCalendar>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            policy,
            sink,
            calendar,
            config,
        }
    }

    /// Validate the request, reserve the funds, persist the pending
    /// record. No ledger action happens before the policy pre-checks
    /// pass.
    pub fn submit(&self, request: TransferRequest) -> CoreResult<TransferApproval> {
        self.validate_request(&request)?;

        // Withdrawal check against the source tier; deposit check against
        // the destination tier when the destination is tiered too.
        self.policy.validate(
            &request.from_account_id,
            request.from_client_type_id,
            request.activation_channel_id,
            -request.amount,
        )?;
        if let Some(to_client_type) = request.to_client_type_id {
            self.policy.validate(
                &request.to_account_id,
                to_client_type,
                request.activation_channel_id,
                request.amount,
            )?;
        }

        let hold_ref = self.ledger.hold(&request.from_account_id, request.amount)?;
        let approval = TransferApproval {
            id: Uuid::new_v4().to_string(),
            amount: request.amount,
            transfer_type: request.transfer_type,
            status: TransferStatus::SubmittedPendingApproval,
            from_account_id: request.from_account_id,
            from_account_type: request.from_account_type,
            from_account_number: request.from_account_number,
            to_account_id: request.to_account_id,
            to_account_type: request.to_account_type,
            to_account_number: request.to_account_number,
            hold_transaction_id: hold_ref.clone(),
            release_transaction_id: None,
            withdraw_transaction_id: None,
            activation_channel_id: request.activation_channel_id,
            to_bank_id: request.to_bank_id,
            reason: None,
            created_by: request.created_by,
            created_on: self.calendar.business_date(),
        };

        if let Err(persist_err) = self.store.insert_approval(&approval) {
            // The hold must not outlive a failed submit.
            log::error!(
                "persisting approval {} failed after hold {hold_ref}, releasing: {persist_err}",
                approval.id
            );
            return match self.ledger.release(&hold_ref) {
                Ok(_) => Err(persist_err),
                Err(release_err) => Err(CoreError::InternalInconsistency {
                    approval_id: approval.id,
                    hold_ref,
                    detail: format!(
                        "persist failed ({persist_err}); compensating release failed ({release_err})"
                    ),
                }),
            };
        }

        log::info!(
            "transfer {} submitted: {} -> {} amount {}",
            approval.id,
            approval.from_account_id,
            approval.to_account_id,
            approval.amount
        );
        self.notify(AuditEvent::TransferSubmitted {
            approval_id: approval.id.clone(),
            from_account_id: approval.from_account_id.clone(),
            to_account_id: approval.to_account_id.clone(),
            amount: approval.amount,
            hold_transaction_id: approval.hold_transaction_id.clone(),
        });
        Ok(approval)
    }

    /// Release the hold and execute the transfer, then mark the record
    /// approved. If the ledger call fails the record stays pending and
    /// the caller may retry.
    pub fn approve(
        &self,
        id: &str,
        approved_by: &str,
        reason: &str,
    ) -> CoreResult<TransferApproval> {
        self.validate_reason(reason)?;
        self.store.begin_transition()?;
        let outcome = self.approve_locked(id, approved_by, reason);
        let (approval, event) = self.close_transition(outcome)?;
        log::info!("transfer {id} approved by {approved_by}");
        self.notify(event);
        Ok(approval)
    }

    fn approve_locked(
        &self,
        id: &str,
        approved_by: &str,
        reason: &str,
    ) -> CoreResult<(TransferApproval, AuditEvent)> {
        let mut approval = self.load_pending(id)?;
        let (release_ref, withdraw_ref) = self
            .ledger
            .release_and_execute(&approval.hold_transaction_id, &approval.to_account_id)?;
        self.finish_transition(
            id,
            TransferStatus::Approved,
            reason,
            &release_ref,
            Some(&withdraw_ref),
        )?;
        approval.status = TransferStatus::Approved;
        approval.reason = Some(reason.to_string());
        approval.release_transaction_id = Some(release_ref.clone());
        approval.withdraw_transaction_id = Some(withdraw_ref.clone());
        let event = AuditEvent::TransferApproved {
            approval_id: approval.id.clone(),
            approved_by: approved_by.to_string(),
            release_transaction_id: release_ref,
            withdraw_transaction_id: withdraw_ref,
        };
        Ok((approval, event))
    }

    /// Release the hold with no execution, then mark the record
    /// rejected. Also the only way to abandon a pending transfer.
    pub fn reject(
        &self,
        id: &str,
        rejected_by: &str,
        reason: &str,
    ) -> CoreResult<TransferApproval> {
        self.validate_reason(reason)?;
        self.store.begin_transition()?;
        let outcome = self.reject_locked(id, rejected_by, reason);
        let (approval, event) = self.close_transition(outcome)?;
        log::info!("transfer {id} rejected by {rejected_by}");
        self.notify(event);
        Ok(approval)
    }

    fn reject_locked(
        &self,
        id: &str,
        rejected_by: &str,
        reason: &str,
    ) -> CoreResult<(TransferApproval, AuditEvent)> {
        let mut approval = self.load_pending(id)?;
        let release_ref = self.ledger.release(&approval.hold_transaction_id)?;
        self.finish_transition(id, TransferStatus::Rejected, reason, &release_ref, None)?;
        approval.status = TransferStatus::Rejected;
        approval.reason = Some(reason.to_string());
        approval.release_transaction_id = Some(release_ref.clone());
        let event = AuditEvent::TransferRejected {
            approval_id: approval.id.clone(),
            rejected_by: rejected_by.to_string(),
            release_transaction_id: release_ref,
            reason: Some(reason.to_string()),
        };
        Ok((approval, event))
    }

    pub fn get(&self, id: &str) -> CoreResult<TransferApproval> {
        self.store
            .get_approval(id)?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))
    }

    pub fn pending(&self) -> CoreResult<Vec<TransferApproval>> {
        self.store
            .approvals_by_status(TransferStatus::SubmittedPendingApproval)
    }

    pub fn by_status(&self, status: TransferStatus) -> CoreResult<Vec<TransferApproval>> {
        self.store.approvals_by_status(status)
    }

    /// Commit on success, roll back on any failure. A commit failure
    /// leaves the record pending; the ledger side replays idempotently
    /// on retry, so success is never reported without the persisted
    /// state change.
    fn close_transition<T>(&self, outcome: CoreResult<T>) -> CoreResult<T> {
        match outcome {
            Ok(value) => match self.store.commit_transition() {
                Ok(()) => Ok(value),
                Err(err) => {
                    self.store.rollback_transition();
                    Err(err)
                }
            },
            Err(err) => {
                self.store.rollback_transition();
                Err(err)
            }
        }
    }

    fn load_pending(&self, id: &str) -> CoreResult<TransferApproval> {
        let approval = self
            .store
            .get_approval(id)?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        if !approval.status.can_transition() {
            return Err(CoreError::InvalidState {
                id: id.to_string(),
                status: approval.status.to_string(),
            });
        }
        Ok(approval)
    }

    fn finish_transition(
        &self,
        id: &str,
        to: TransferStatus,
        reason: &str,
        release_ref: &str,
        withdraw_ref: Option<&str>,
    ) -> CoreResult<()> {
        let updated = self.store.transition_status(
            id,
            TransferStatus::SubmittedPendingApproval,
            to,
            Some(reason),
            Some(release_ref),
            withdraw_ref,
        )?;
        if !updated {
            // Unreachable while the write lock is held; kept as a guard
            // against stores that cannot honor begin_transition.
            let status = self
                .store
                .get_approval(id)?
                .map(|a| a.status.to_string())
                .unwrap_or_else(|| "missing".to_string());
            return Err(CoreError::InvalidState {
                id: id.to_string(),
                status,
            });
        }
        Ok(())
    }

    fn validate_request(&self, request: &TransferRequest) -> CoreResult<()> {
        if request.amount <= Amount::ZERO {
            return Err(CoreError::Validation(
                "transfer amount must be positive".to_string(),
            ));
        }
        for (label, value) in [
            ("from_account_id", &request.from_account_id),
            ("to_account_id", &request.to_account_id),
            ("created_by", &request.created_by),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::Validation(format!("{label} is required")));
            }
        }
        for (label, value) in [
            ("from_account_number", &request.from_account_number),
            ("to_account_number", &request.to_account_number),
        ] {
            if value.is_empty() || value.len() > self.config.account_number_max_len {
                return Err(CoreError::Validation(format!(
                    "{label} must be 1..={} characters",
                    self.config.account_number_max_len
                )));
            }
        }
        if request.transfer_type == TransferType::InterBank && request.to_bank_id.is_none() {
            return Err(CoreError::Validation(
                "inter-bank transfer requires to_bank_id".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_reason(&self, reason: &str) -> CoreResult<()> {
        if reason.len() > self.config.reason_max_len {
            return Err(CoreError::Validation(format!(
                "reason must be at most {} characters",
                self.config.reason_max_len
            )));
        }
        Ok(())
    }

    fn notify(&self, event: AuditEvent) {
        if let Err(err) = self.sink.notify(&event) {
            log::warn!("notification sink failed for {}: {err}", event.event_type());
        }
    }
}
