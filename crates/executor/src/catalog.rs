//! Deliverable catalog accessor with an explicit cache.
//!
//! Catalogs are content-admin data that almost never change, so each
//! contract type's catalog is loaded once and kept until `replace_catalog`
//! writes a new one. Nothing else invalidates the cache.

use std::sync::Arc;

use pact_core::{Catalog, ContractType, Deliverable, NotFound, PactError, Principal};
use pact_storage::PactStorage;
use tracing::{debug, info};

use crate::txn::TxError;
use crate::Executor;

impl<S: PactStorage> Executor<S> {
    /// Ordered deliverables and options of `contract_type`.
    ///
    /// Fails with `NotFound::UnsupportedContractType` for contract types
    /// without configurable deliverables. A supported type with nothing
    /// stored yields an empty catalog.
    pub async fn list_deliverables(
        &self,
        contract_type: ContractType,
    ) -> Result<Arc<Catalog>, PactError> {
        if !contract_type.is_configurable() {
            return Err(NotFound::UnsupportedContractType(contract_type).into());
        }
        if let Some(cached) = self.catalogs.read().await.get(&contract_type) {
            return Ok(cached.clone());
        }

        let stored = self.query(self.storage.get_catalog(contract_type)).await?;
        let catalog = Arc::new(match stored {
            Some(catalog) => catalog,
            None => Catalog::new(contract_type, Vec::new())?,
        });
        debug!(contract_type = %contract_type, deliverables = catalog.deliverables.len(), "Catalog loaded");

        let mut cache = self.catalogs.write().await;
        Ok(cache.entry(contract_type).or_insert(catalog).clone())
    }

    /// Replace the catalog of `contract_type` (content-admin write).
    pub async fn replace_catalog(
        &self,
        principal: &Principal,
        contract_type: ContractType,
        deliverables: Vec<Deliverable>,
    ) -> Result<Arc<Catalog>, PactError> {
        principal.require_admin("replace the deliverable catalog")?;
        let catalog = Catalog::new(contract_type, deliverables)?;

        self.retrying("replace_catalog", || self.try_replace_catalog(&catalog))
            .await?;

        let catalog = Arc::new(catalog);
        self.catalogs
            .write()
            .await
            .insert(contract_type, catalog.clone());
        info!(
            contract_type = %contract_type,
            deliverables = catalog.deliverables.len(),
            by = %principal.subject,
            "Catalog replaced"
        );
        Ok(catalog)
    }

    async fn try_replace_catalog(&self, catalog: &Catalog) -> Result<(), TxError> {
        let mut snap = self.begin().await?;
        let result = self
            .bounded(self.storage.replace_catalog(&mut snap, catalog.clone()))
            .await;
        self.finish(snap, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExecutorSettings;
    use pact_core::{BilingualText, DeliverableOption};
    use pact_storage::MemoryStorage;

    fn deliverable(id: &str, number: u32) -> Deliverable {
        Deliverable {
            id: id.into(),
            contract_type: ContractType::Full,
            number,
            title: BilingualText::new(id, id),
            timeline: "2025-2026".into(),
            activity: None,
            options: vec![DeliverableOption {
                id: format!("{id}-o1"),
                number: 1,
                text: BilingualText::new("option", "option"),
                target: None,
            }],
        }
    }

    fn executor() -> Executor<MemoryStorage> {
        Executor::new(Arc::new(MemoryStorage::new()), ExecutorSettings::default())
    }

    #[tokio::test]
    async fn unsupported_type_is_distinct_from_empty() {
        let ex = executor();
        let empty = ex.list_deliverables(ContractType::Partial).await.unwrap();
        assert!(empty.is_empty());

        let err = ex.list_deliverables(ContractType::Observer).await.unwrap_err();
        assert_eq!(
            err,
            PactError::NotFound(NotFound::UnsupportedContractType(ContractType::Observer))
        );
    }

    #[tokio::test]
    async fn cache_survives_storage_writes_until_replace() {
        let ex = executor();
        let admin = Principal::admin("content-admin");
        ex.replace_catalog(&admin, ContractType::Full, vec![deliverable("d1", 1)])
            .await
            .unwrap();
        assert_eq!(ex.list_deliverables(ContractType::Full).await.unwrap().deliverables.len(), 1);

        // A write that bypasses the executor is not observed.
        let mut snap = ex.storage().begin_snapshot().await.unwrap();
        let bypass = Catalog::new(ContractType::Full, vec![deliverable("d1", 1), deliverable("d2", 2)])
            .unwrap();
        ex.storage().replace_catalog(&mut snap, bypass).await.unwrap();
        ex.storage().commit_snapshot(snap).await.unwrap();
        assert_eq!(ex.list_deliverables(ContractType::Full).await.unwrap().deliverables.len(), 1);

        ex.replace_catalog(
            &admin,
            ContractType::Full,
            vec![deliverable("d2", 2), deliverable("d1", 1), deliverable("d3", 3)],
        )
        .await
        .unwrap();
        let ids: Vec<String> = ex
            .list_deliverables(ContractType::Full)
            .await
            .unwrap()
            .deliverable_ids()
            .map(str::to_owned)
            .collect();
        assert_eq!(ids, ["d1", "d2", "d3"]);
    }

    #[tokio::test]
    async fn replace_requires_admin() {
        let ex = executor();
        let err = ex
            .replace_catalog(&Principal::partner("p-1"), ContractType::Full, vec![])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "permission");
    }
}
