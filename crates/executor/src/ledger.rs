//! Selection ledger: one `(deliverable, option, baseline)` record per
//! partner per deliverable, replaced as a whole.

use pact_core::{
    now_rfc3339, resolve_selections, Catalog, LifecycleState, PactError, Partner,
    SelectionInput, SelectionView, ValidatedSelections,
};
use pact_storage::PactStorage;
use tracing::{debug, info};

use crate::txn::TxError;
use crate::Executor;

enum Recorded {
    Unchanged,
    Replaced { from: LifecycleState, to: LifecycleState },
}

impl<S: PactStorage> Executor<S> {
    /// Validate and atomically replace every selection of a partner.
    ///
    /// Legal while the configuration is open (`signed`, `configuring`,
    /// `configured`); recording moves the partner to `configuring`, so a
    /// configured partner must finalize again. All-or-nothing: one
    /// `Validation` error lists every failing deliverable and nothing is
    /// written. Re-sending the stored payload writes nothing.
    pub async fn record_selections(
        &self,
        partner_id: &str,
        inputs: &[SelectionInput],
    ) -> Result<Vec<SelectionView>, PactError> {
        let record = self.query(self.storage.get_partner(partner_id)).await?;
        ensure_editable(&record.partner)?;
        let catalog = self.list_deliverables(record.partner.contract_type).await?;

        let validated = ValidatedSelections::validate(&catalog, inputs).inspect_err(|err| {
            debug!(partner = %partner_id, error = %err, "Selections rejected");
        })?;

        let outcome = self
            .retrying("record_selections", || {
                self.record_once(partner_id, &validated)
            })
            .await?;
        match outcome {
            Recorded::Unchanged => {
                debug!(partner = %partner_id, "Selections unchanged, nothing written");
            }
            Recorded::Replaced { from, to } => {
                info!(
                    partner = %partner_id,
                    selections = validated.items().len(),
                    from = %from,
                    to = %to,
                    "Selections recorded"
                );
            }
        }

        self.resolved(partner_id, &catalog).await
    }

    async fn record_once(
        &self,
        partner_id: &str,
        validated: &ValidatedSelections,
    ) -> Result<Recorded, TxError> {
        let mut snap = self.begin().await?;
        let result = self.record_in(&mut snap, partner_id, validated).await;
        self.finish(snap, result).await
    }

    async fn record_in(
        &self,
        snap: &mut S::Snapshot,
        partner_id: &str,
        validated: &ValidatedSelections,
    ) -> Result<Recorded, TxError> {
        let record = self
            .bounded(self.storage.get_partner_for_update(snap, partner_id))
            .await?;
        ensure_editable(&record.partner)?;

        let existing = self
            .bounded(self.storage.get_selections_for_update(snap, partner_id))
            .await?;
        if validated.matches(&existing) {
            return Ok(Recorded::Unchanged);
        }

        let rows = validated.clone().into_selections(partner_id, &now_rfc3339());
        self.bounded(self.storage.replace_selections(snap, partner_id, rows))
            .await?;

        // Always bump the version so concurrent recorders serialize on it.
        let from = record.partner.state;
        let next = Partner {
            state: LifecycleState::Configuring,
            ..record.partner
        };
        self.bounded(self.storage.update_partner(snap, record.version, &next))
            .await?;
        Ok(Recorded::Replaced {
            from,
            to: next.state,
        })
    }

    /// A partner's current selections resolved against the catalog.
    pub async fn get_selections(&self, partner_id: &str) -> Result<Vec<SelectionView>, PactError> {
        let record = self.query(self.storage.get_partner(partner_id)).await?;
        let catalog = self.list_deliverables(record.partner.contract_type).await?;
        self.resolved(partner_id, &catalog).await
    }

    async fn resolved(
        &self,
        partner_id: &str,
        catalog: &Catalog,
    ) -> Result<Vec<SelectionView>, PactError> {
        let selections = self.query(self.storage.list_selections(partner_id)).await?;
        Ok(resolve_selections(catalog, &selections))
    }
}

fn ensure_editable(partner: &Partner) -> Result<(), PactError> {
    if partner.state.is_editable() {
        return Ok(());
    }
    let reason = if partner.state < LifecycleState::Signed {
        "the agreement has not been signed"
    } else {
        "the configuration has been submitted; request a reconfiguration"
    };
    Err(PactError::state_conflict(
        "record_selections",
        partner.state,
        reason,
    ))
}
