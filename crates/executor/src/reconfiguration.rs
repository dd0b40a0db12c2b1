//! Reconfiguration request workflow.
//!
//! A submitted partner may ask to reopen its configuration. An administrator
//! approves (partner back to `configuring`, selections kept as editable
//! starting values) or rejects (partner back to `submitted`). Resolution is
//! terminal for the request. At most one request per partner is pending; the
//! storage backend enforces this at commit as well.

use pact_core::{
    now_rfc3339, AdminScope, LifecycleState, PactError, Partner, Principal,
    ReconfigurationRequest, RequestStatus, Violation,
};
use pact_storage::PactStorage;
use tracing::{debug, info};

use crate::txn::TxError;
use crate::Executor;

impl<S: PactStorage> Executor<S> {
    /// Open a reconfiguration request for a submitted partner.
    pub async fn request_reconfiguration(
        &self,
        partner_id: &str,
        reason: &str,
    ) -> Result<ReconfigurationRequest, PactError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PactError::Validation(vec![Violation::field(
                "reason",
                "must not be empty",
            )]));
        }

        let request = self
            .retrying("request_reconfiguration", || {
                self.request_once(partner_id, reason)
            })
            .await?;
        info!(
            partner = %partner_id,
            request = %request.id,
            from = %LifecycleState::Submitted,
            to = %LifecycleState::PendingReconfiguration,
            "Reconfiguration requested"
        );
        Ok(request)
    }

    async fn request_once(
        &self,
        partner_id: &str,
        reason: &str,
    ) -> Result<ReconfigurationRequest, TxError> {
        let mut snap = self.begin().await?;
        let result = self.request_in(&mut snap, partner_id, reason).await;
        self.finish(snap, result).await
    }

    async fn request_in(
        &self,
        snap: &mut S::Snapshot,
        partner_id: &str,
        reason: &str,
    ) -> Result<ReconfigurationRequest, TxError> {
        let record = self
            .bounded(self.storage.get_partner_for_update(snap, partner_id))
            .await?;

        let pending = self
            .bounded(
                self.storage
                    .list_reconfiguration_requests(Some(partner_id), Some(RequestStatus::Pending)),
            )
            .await?;
        if let Some(existing) = pending.into_iter().next() {
            debug!(partner = %partner_id, request = %existing.id, "Duplicate reconfiguration request");
            return Err(PactError::DuplicateRequest {
                partner_id: partner_id.to_string(),
                request_id: existing.id,
            }
            .into());
        }
        if record.partner.state != LifecycleState::Submitted {
            return Err(PactError::state_conflict(
                "request_reconfiguration",
                record.partner.state,
                "only a submitted configuration can be reopened",
            )
            .into());
        }

        let request = ReconfigurationRequest {
            id: uuid::Uuid::new_v4().to_string(),
            partner_id: partner_id.to_string(),
            contract_type: record.partner.contract_type,
            reason: reason.to_string(),
            status: RequestStatus::Pending,
            created_at: now_rfc3339(),
            resolved_at: None,
            resolved_by: None,
        };
        self.bounded(
            self.storage
                .insert_reconfiguration_request(snap, request.clone()),
        )
        .await?;

        let next = Partner {
            state: LifecycleState::PendingReconfiguration,
            ..record.partner
        };
        self.bounded(self.storage.update_partner(snap, record.version, &next))
            .await?;
        Ok(request)
    }

    /// Pending requests whose contract type `scope` covers, oldest first.
    pub async fn list_pending(
        &self,
        principal: &Principal,
        scope: &AdminScope,
    ) -> Result<Vec<ReconfigurationRequest>, PactError> {
        principal.require_admin("list reconfiguration requests")?;
        let pending = self
            .query(
                self.storage
                    .list_reconfiguration_requests(None, Some(RequestStatus::Pending)),
            )
            .await?;
        Ok(pending
            .into_iter()
            .filter(|r| scope.covers(r.contract_type))
            .collect())
    }

    /// Approve a pending request: the partner returns to `configuring`.
    pub async fn approve(
        &self,
        principal: &Principal,
        request_id: &str,
    ) -> Result<ReconfigurationRequest, PactError> {
        principal.require_admin("approve reconfiguration requests")?;
        self.resolve(principal, request_id, RequestStatus::Approved)
            .await
    }

    /// Reject a pending request: the partner stays `submitted`.
    pub async fn reject(
        &self,
        principal: &Principal,
        request_id: &str,
    ) -> Result<ReconfigurationRequest, PactError> {
        principal.require_admin("reject reconfiguration requests")?;
        self.resolve(principal, request_id, RequestStatus::Rejected)
            .await
    }

    async fn resolve(
        &self,
        principal: &Principal,
        request_id: &str,
        outcome: RequestStatus,
    ) -> Result<ReconfigurationRequest, PactError> {
        let action = match outcome {
            RequestStatus::Approved => "approve",
            _ => "reject",
        };
        let (request, from, to) = self
            .retrying(action, || {
                self.resolve_once(&principal.subject, request_id, outcome)
            })
            .await?;
        info!(
            partner = %request.partner_id,
            request = %request.id,
            action,
            by = %principal.subject,
            from = %from,
            to = %to,
            "Reconfiguration request resolved"
        );
        Ok(request)
    }

    async fn resolve_once(
        &self,
        admin: &str,
        request_id: &str,
        outcome: RequestStatus,
    ) -> Result<(ReconfigurationRequest, LifecycleState, LifecycleState), TxError> {
        let mut snap = self.begin().await?;
        let result = self.resolve_in(&mut snap, admin, request_id, outcome).await;
        self.finish(snap, result).await
    }

    async fn resolve_in(
        &self,
        snap: &mut S::Snapshot,
        admin: &str,
        request_id: &str,
        outcome: RequestStatus,
    ) -> Result<(ReconfigurationRequest, LifecycleState, LifecycleState), TxError> {
        let mut request = self
            .bounded(
                self.storage
                    .get_reconfiguration_request_for_update(snap, request_id),
            )
            .await?;
        let record = self
            .bounded(self.storage.get_partner_for_update(snap, &request.partner_id))
            .await?;

        let action = match outcome {
            RequestStatus::Approved => "approve",
            _ => "reject",
        };
        if request.status.is_terminal() {
            return Err(PactError::state_conflict(
                action,
                record.partner.state,
                format!("request '{}' is already {}", request.id, request.status),
            )
            .into());
        }
        if record.partner.state != LifecycleState::PendingReconfiguration {
            return Err(PactError::state_conflict(
                action,
                record.partner.state,
                "partner is not awaiting reconfiguration",
            )
            .into());
        }

        let from = record.partner.state;
        let next = match outcome {
            // Selections are kept; only the signature is withdrawn.
            RequestStatus::Approved => Partner {
                state: LifecycleState::Configuring,
                final_signature: None,
                ..record.partner
            },
            _ => Partner {
                state: LifecycleState::Submitted,
                ..record.partner
            },
        };
        self.bounded(self.storage.update_partner(snap, record.version, &next))
            .await?;

        request.status = outcome;
        request.resolved_at = Some(now_rfc3339());
        request.resolved_by = Some(admin.to_string());
        self.bounded(
            self.storage
                .update_reconfiguration_request(snap, request.clone()),
        )
        .await?;
        Ok((request, from, next.state))
    }

    /// Every request of a partner, oldest first.
    pub async fn history(&self, partner_id: &str) -> Result<Vec<ReconfigurationRequest>, PactError> {
        self.query(self.storage.get_partner(partner_id)).await?;
        self.query(
            self.storage
                .list_reconfiguration_requests(Some(partner_id), None),
        )
        .await
    }

    pub async fn get_request(&self, request_id: &str) -> Result<ReconfigurationRequest, PactError> {
        self.query(self.storage.get_reconfiguration_request(request_id))
            .await
    }
}
