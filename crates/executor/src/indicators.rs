use pact_core::{CalculationRule, ContractType, Indicator, PactError, Principal};
use pact_eval::{evaluate, validate_indicator, validate_rules, Evaluation};
use pact_storage::{IndicatorRecord, PactStorage};
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::txn::TxError;
use crate::Executor;

impl<S: PactStorage> Executor<S> {
    /// Store a new indicator after validating its definition.
    pub async fn register_indicator(&self, indicator: &Indicator) -> Result<(), PactError> {
        validate_indicator(indicator)?;
        self.retrying("register_indicator", || self.register_indicator_once(indicator))
            .await?;
        info!(indicator = %indicator.id, contract_type = %indicator.contract_type, "Indicator registered");
        Ok(())
    }

    async fn register_indicator_once(&self, indicator: &Indicator) -> Result<(), TxError> {
        let mut snap = self.begin().await?;
        let result = self
            .bounded(self.storage.initialize_indicator(&mut snap, indicator))
            .await;
        self.finish(snap, result).await
    }

    pub async fn list_indicators(
        &self,
        contract_type: Option<ContractType>,
    ) -> Result<Vec<IndicatorRecord>, PactError> {
        self.query(self.storage.list_indicators(contract_type)).await
    }

    pub async fn get_indicator(&self, indicator_id: &str) -> Result<IndicatorRecord, PactError> {
        self.query(self.storage.get_indicator(indicator_id)).await
    }

    /// Compute the target for a reported baseline.
    ///
    /// A rule-coverage gap is logged as an error: it means the stored rule set
    /// is broken, not that the caller sent something wrong.
    pub async fn evaluate_indicator(
        &self,
        indicator_id: &str,
        baseline: Decimal,
    ) -> Result<Evaluation, PactError> {
        let record = self.get_indicator(indicator_id).await?;
        match evaluate(&record.indicator, baseline) {
            Ok(evaluation) => {
                debug!(
                    indicator = %indicator_id,
                    baseline = %baseline,
                    target = %evaluation.target,
                    rule = evaluation.matched_rule,
                    "Indicator evaluated"
                );
                Ok(evaluation)
            }
            Err(err @ PactError::NoMatchingRule { .. }) => {
                error!(
                    indicator = %indicator_id,
                    version = record.version,
                    baseline = %baseline,
                    "No calculation rule covers the reported baseline"
                );
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Replace an indicator's rule set. Later evaluations use the new rules.
    pub async fn patch_rules(
        &self,
        principal: &Principal,
        indicator_id: &str,
        rules: Vec<CalculationRule>,
    ) -> Result<IndicatorRecord, PactError> {
        principal.require_admin("patch indicator rules")?;
        let record = self
            .retrying("patch_rules", || self.patch_once(indicator_id, &rules))
            .await?;
        info!(
            indicator = %indicator_id,
            version = record.version,
            by = %principal.subject,
            "Indicator rules replaced"
        );
        Ok(record)
    }

    async fn patch_once(
        &self,
        indicator_id: &str,
        rules: &[CalculationRule],
    ) -> Result<IndicatorRecord, TxError> {
        let mut snap = self.begin().await?;
        let result = self.patch_in(&mut snap, indicator_id, rules).await;
        self.finish(snap, result).await
    }

    async fn patch_in(
        &self,
        snap: &mut S::Snapshot,
        indicator_id: &str,
        rules: &[CalculationRule],
    ) -> Result<IndicatorRecord, TxError> {
        let current = self
            .bounded(self.storage.get_indicator_for_update(snap, indicator_id))
            .await?;

        let violations = validate_rules(current.indicator.direction, rules);
        if !violations.is_empty() {
            debug!(indicator = %indicator_id, violations = violations.len(), "Rule patch rejected");
            return Err(PactError::Validation(violations).into());
        }

        let indicator = Indicator {
            rules: rules.to_vec(),
            ..current.indicator
        };
        let version = self
            .bounded(self.storage.update_indicator(snap, current.version, &indicator))
            .await?;
        Ok(IndicatorRecord {
            indicator,
            version,
            updated_at: pact_core::now_rfc3339(),
        })
    }
}
