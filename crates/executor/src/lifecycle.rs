//! Partner lifecycle state machine.
//!
//! `unread → read → signed → configuring → configured → submitted`, with
//! `pending_reconfiguration` entered from `submitted` by the
//! reconfiguration workflow. Each transition re-reads the partner inside the
//! snapshot it writes from, so two concurrent callers cannot both act on the
//! same stale state.

use pact_core::{
    missing_deliverables, Catalog, ContractType, FinalSignature, LifecycleState, Partner, PactError,
    PartnerStatus, RequestStatus,
};
use pact_storage::PactStorage;
use tracing::{debug, info};

use crate::txn::TxError;
use crate::Executor;

/// What a transition decided for the partner it was given.
enum Step {
    Stay,
    Move(Partner),
}

/// Outcome of one committed transition attempt.
struct Applied {
    partner: Partner,
    from: Option<LifecycleState>,
}

impl<S: PactStorage> Executor<S> {
    /// Create a partner in `unread`. Identity-side hook used when seeding.
    pub async fn register_partner(
        &self,
        partner_id: &str,
        contract_type: ContractType,
    ) -> Result<PartnerStatus, PactError> {
        let partner = Partner::new(partner_id, contract_type);
        self.retrying("register_partner", || self.try_register(&partner))
            .await?;
        info!(partner = %partner_id, contract_type = %contract_type, "Partner registered");
        Ok(PartnerStatus::of(&partner, None))
    }

    async fn try_register(&self, partner: &Partner) -> Result<(), TxError> {
        let mut snap = self.begin().await?;
        let result = self
            .bounded(self.storage.initialize_partner(&mut snap, partner))
            .await;
        self.finish(snap, result).await
    }

    /// Current lifecycle flags of a partner.
    pub async fn status(&self, partner_id: &str) -> Result<PartnerStatus, PactError> {
        let record = self.query(self.storage.get_partner(partner_id)).await?;
        self.status_of(&record.partner).await
    }

    pub(crate) async fn status_of(&self, partner: &Partner) -> Result<PartnerStatus, PactError> {
        let pending = if partner.state == LifecycleState::PendingReconfiguration {
            self.query(
                self.storage
                    .list_reconfiguration_requests(Some(partner.id.as_str()), Some(RequestStatus::Pending)),
            )
            .await?
            .into_iter()
            .next()
            .map(|r| r.id)
        } else {
            None
        };
        Ok(PartnerStatus::of(partner, pending))
    }

    /// `unread → read`. A no-op once the agreement has been read.
    pub async fn mark_read(&self, partner_id: &str) -> Result<PartnerStatus, PactError> {
        let partner = self
            .transition("mark_read", partner_id, |p| match p.state {
                LifecycleState::Unread => Ok(Step::Move(Partner {
                    state: LifecycleState::Read,
                    ..p.clone()
                })),
                _ => Ok(Step::Stay),
            })
            .await?;
        self.status_of(&partner).await
    }

    /// `read → signed`. Fails before the agreement has been read; a no-op once signed.
    pub async fn mark_signed(&self, partner_id: &str) -> Result<PartnerStatus, PactError> {
        let partner = self
            .transition("mark_signed", partner_id, |p| match p.state {
                LifecycleState::Unread => Err(PactError::state_conflict(
                    "mark_signed",
                    p.state,
                    "the agreement has not been read",
                )),
                LifecycleState::Read => Ok(Step::Move(Partner {
                    state: LifecycleState::Signed,
                    ..p.clone()
                })),
                _ => Ok(Step::Stay),
            })
            .await?;
        self.status_of(&partner).await
    }

    /// `signed → configuring`. A no-op while configuration is already open.
    pub async fn begin_configuration(&self, partner_id: &str) -> Result<PartnerStatus, PactError> {
        let partner = self
            .transition("begin_configuration", partner_id, |p| match p.state {
                LifecycleState::Unread | LifecycleState::Read => Err(PactError::state_conflict(
                    "begin_configuration",
                    p.state,
                    "the agreement has not been signed",
                )),
                LifecycleState::Signed => Ok(Step::Move(Partner {
                    state: LifecycleState::Configuring,
                    ..p.clone()
                })),
                LifecycleState::Configuring | LifecycleState::Configured => Ok(Step::Stay),
                LifecycleState::Submitted | LifecycleState::PendingReconfiguration => {
                    Err(PactError::state_conflict(
                        "begin_configuration",
                        p.state,
                        "the configuration has been submitted; request a reconfiguration",
                    ))
                }
            })
            .await?;
        self.status_of(&partner).await
    }

    /// `configuring → configured`, only when the ledger is complete.
    ///
    /// Fails with `IncompleteConfiguration` naming every deliverable that
    /// lacks exactly one well-formed selection, also from `signed`. A no-op
    /// when already configured.
    pub async fn finalize_configuration(
        &self,
        partner_id: &str,
    ) -> Result<PartnerStatus, PactError> {
        let record = self.query(self.storage.get_partner(partner_id)).await?;
        let catalog = self.list_deliverables(record.partner.contract_type).await?;

        let applied = self
            .retrying("finalize_configuration", || {
                self.finalize_once(partner_id, catalog.as_ref())
            })
            .await?;
        self.log_transition("finalize_configuration", &applied);
        self.status_of(&applied.partner).await
    }

    async fn finalize_once(&self, partner_id: &str, catalog: &Catalog) -> Result<Applied, TxError> {
        let mut snap = self.begin().await?;
        let result = self.finalize_in(&mut snap, partner_id, catalog).await;
        self.finish(snap, result).await
    }

    async fn finalize_in(
        &self,
        snap: &mut S::Snapshot,
        partner_id: &str,
        catalog: &Catalog,
    ) -> Result<Applied, TxError> {
        let record = self
            .bounded(self.storage.get_partner_for_update(snap, partner_id))
            .await?;
        let partner = record.partner;
        match partner.state {
            LifecycleState::Configured => {
                return Ok(Applied {
                    partner,
                    from: None,
                })
            }
            LifecycleState::Signed | LifecycleState::Configuring => {}
            state => {
                let reason = if state < LifecycleState::Signed {
                    "the agreement has not been signed"
                } else {
                    "the configuration has already been submitted"
                };
                return Err(
                    PactError::state_conflict("finalize_configuration", state, reason).into(),
                );
            }
        }

        let selections = self
            .bounded(self.storage.get_selections_for_update(snap, partner_id))
            .await?;
        let missing = missing_deliverables(catalog, &selections);
        if !missing.is_empty() {
            debug!(partner = %partner_id, missing = missing.len(), "Finalize rejected, ledger incomplete");
            return Err(PactError::IncompleteConfiguration { missing }.into());
        }
        // A complete ledger in `signed` means an empty catalog; states are never skipped.
        if partner.state == LifecycleState::Signed {
            return Err(PactError::state_conflict(
                "finalize_configuration",
                partner.state,
                "configuration has not begun",
            )
            .into());
        }

        let from = partner.state;
        let next = Partner {
            state: LifecycleState::Configured,
            ..partner
        };
        self.bounded(self.storage.update_partner(snap, record.version, &next))
            .await?;
        Ok(Applied {
            partner: next,
            from: Some(from),
        })
    }

    /// `configured → submitted`, storing the final signature.
    ///
    /// Re-submitting the identical signature is a no-op. Any other data after
    /// submission fails with `StateConflict`: the reconfiguration workflow is
    /// the only way back.
    pub async fn submit(
        &self,
        partner_id: &str,
        signature: FinalSignature,
    ) -> Result<PartnerStatus, PactError> {
        let violations = signature.validate();
        if !violations.is_empty() {
            debug!(partner = %partner_id, violations = violations.len(), "Submission rejected");
            return Err(PactError::Validation(violations));
        }

        let partner = self
            .transition("submit", partner_id, |p| match p.state {
                LifecycleState::Configured => Ok(Step::Move(Partner {
                    state: LifecycleState::Submitted,
                    final_signature: Some(signature.clone()),
                    ..p.clone()
                })),
                LifecycleState::Submitted | LifecycleState::PendingReconfiguration => {
                    if p.final_signature.as_ref() == Some(&signature) {
                        Ok(Step::Stay)
                    } else {
                        Err(PactError::state_conflict(
                            "submit",
                            p.state,
                            "a different signature was already submitted; request a reconfiguration",
                        ))
                    }
                }
                state => Err(PactError::state_conflict(
                    "submit",
                    state,
                    "the configuration has not been finalized",
                )),
            })
            .await?;
        self.status_of(&partner).await
    }

    /// Run a pure state decision against a freshly read partner and write
    /// the result conditionally on the version that was read.
    async fn transition<F>(
        &self,
        action: &'static str,
        partner_id: &str,
        decide: F,
    ) -> Result<Partner, PactError>
    where
        F: Fn(&Partner) -> Result<Step, PactError> + Sync,
    {
        let applied = self
            .retrying(action, || self.transition_once(partner_id, &decide))
            .await?;
        self.log_transition(action, &applied);
        Ok(applied.partner)
    }

    async fn transition_once<F>(&self, partner_id: &str, decide: &F) -> Result<Applied, TxError>
    where
        F: Fn(&Partner) -> Result<Step, PactError> + Sync,
    {
        let mut snap = self.begin().await?;
        let result = self.transition_in(&mut snap, partner_id, decide).await;
        self.finish(snap, result).await
    }

    async fn transition_in<F>(
        &self,
        snap: &mut S::Snapshot,
        partner_id: &str,
        decide: &F,
    ) -> Result<Applied, TxError>
    where
        F: Fn(&Partner) -> Result<Step, PactError> + Sync,
    {
        let record = self
            .bounded(self.storage.get_partner_for_update(snap, partner_id))
            .await?;
        match decide(&record.partner)? {
            Step::Stay => Ok(Applied {
                partner: record.partner,
                from: None,
            }),
            Step::Move(next) => {
                self.bounded(self.storage.update_partner(snap, record.version, &next))
                    .await?;
                Ok(Applied {
                    partner: next,
                    from: Some(record.partner.state),
                })
            }
        }
    }

    fn log_transition(&self, action: &str, applied: &Applied) {
        match applied.from {
            Some(from) => info!(
                partner = %applied.partner.id,
                action,
                from = %from,
                to = %applied.partner.state,
                "Lifecycle transition"
            ),
            None => debug!(
                partner = %applied.partner.id,
                action,
                state = %applied.partner.state,
                "Transition was a no-op"
            ),
        }
    }
}
