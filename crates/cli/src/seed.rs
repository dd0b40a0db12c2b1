//! JSON seed documents: catalogs, indicators and partners loaded into a
//! fresh in-memory backend before the CLI or server uses it.

use std::path::Path;
use std::sync::Arc;

use pact_core::{ContractType, Deliverable, Indicator, PactError, Principal};
use pact_executor::{Executor, ExecutorSettings};
use pact_storage::MemoryStorage;
use serde::Deserialize;
use tracing::info;

/// The engine every command runs against.
pub(crate) type Engine = Executor<MemoryStorage>;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SeedDocument {
    pub(crate) catalogs: Vec<SeedCatalog>,
    pub(crate) indicators: Vec<Indicator>,
    pub(crate) partners: Vec<SeedPartner>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SeedCatalog {
    pub(crate) contract_type: ContractType,
    pub(crate) deliverables: Vec<Deliverable>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SeedPartner {
    pub(crate) id: String,
    pub(crate) contract_type: ContractType,
}

impl SeedDocument {
    pub(crate) fn read(path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("error reading seed '{}': {}", path.display(), e))?;
        serde_json::from_str(&raw)
            .map_err(|e| format!("error parsing seed '{}': {}", path.display(), e))
    }
}

/// Build an engine and load `seed` through the regular executor operations,
/// so seeded data passes the same validation as API writes.
pub(crate) async fn engine(
    settings: ExecutorSettings,
    seed: Option<&SeedDocument>,
) -> Result<Engine, PactError> {
    let engine = Executor::new(Arc::new(MemoryStorage::new()), settings);
    if let Some(seed) = seed {
        load(&engine, seed).await?;
    }
    Ok(engine)
}

async fn load(engine: &Engine, seed: &SeedDocument) -> Result<(), PactError> {
    let loader = Principal::admin("seed");
    for catalog in &seed.catalogs {
        engine
            .replace_catalog(&loader, catalog.contract_type, catalog.deliverables.clone())
            .await?;
    }
    for indicator in &seed.indicators {
        engine.register_indicator(indicator).await?;
    }
    for partner in &seed.partners {
        engine
            .register_partner(&partner.id, partner.contract_type)
            .await?;
    }
    info!(
        catalogs = seed.catalogs.len(),
        indicators = seed.indicators.len(),
        partners = seed.partners.len(),
        "Seed loaded"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(json: serde_json::Value) -> SeedDocument {
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn loads_every_section() {
        let seed = document(serde_json::json!({
            "catalogs": [{
                "contract_type": "full",
                "deliverables": [{
                    "id": "d1",
                    "contract_type": "full",
                    "number": 1,
                    "title": { "primary": "Outreach", "secondary": "Sensibilisation" },
                    "timeline": "2025-2026",
                    "options": [{
                        "id": "d1-o1",
                        "number": 1,
                        "text": { "primary": "Workshops", "secondary": "Ateliers" }
                    }]
                }]
            }],
            "partners": [{ "id": "p-1", "contract_type": "full" }]
        }));

        let engine = engine(ExecutorSettings::default(), Some(&seed)).await.unwrap();
        assert_eq!(
            engine.list_deliverables(ContractType::Full).await.unwrap().deliverables.len(),
            1
        );
        assert!(engine.status("p-1").await.is_ok());
    }

    #[tokio::test]
    async fn invalid_seed_catalog_fails_validation() {
        let seed = document(serde_json::json!({
            "catalogs": [{ "contract_type": "observer", "deliverables": [] }]
        }));
        let Err(err) = engine(ExecutorSettings::default(), Some(&seed)).await else {
            panic!("expected the observer catalog to be rejected");
        };
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn unknown_sections_are_rejected() {
        let parsed: Result<SeedDocument, _> =
            serde_json::from_value(serde_json::json!({ "agreements": [] }));
        assert!(parsed.is_err());
    }
}
