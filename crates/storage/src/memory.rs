//! In-memory `PactStorage` backend.
//!
//! Writes are staged in the [`MemorySnapshot`] and only touch shared state in
//! `commit_snapshot`, which re-validates every version, status and
//! uniqueness constraint under a single lock. Used by the CLI server, the
//! executor tests, and as the reference backend for the conformance suite.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use pact_core::{
    now_rfc3339, Catalog, ContractType, Indicator, Partner, ReconfigurationRequest,
    RequestStatus, Selection,
};

use crate::error::{StorageError, PENDING_REQUEST_UNIQUE, SELECTION_UNIQUE};
use crate::record::{IndicatorRecord, PartnerRecord};
use crate::traits::PactStorage;

#[derive(Debug, Default)]
struct Inner {
    partners: BTreeMap<String, PartnerRecord>,
    selections: HashMap<String, Vec<Selection>>,
    /// Creation order.
    requests: Vec<ReconfigurationRequest>,
    indicators: BTreeMap<String, IndicatorRecord>,
    catalogs: HashMap<ContractType, Catalog>,
}

impl Inner {
    fn request(&self, request_id: &str) -> Option<&ReconfigurationRequest> {
        self.requests.iter().find(|r| r.id == request_id)
    }
}

/// Shared, cloneable in-memory storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<Inner>>,
    latency: Option<Duration>,
}

#[derive(Debug)]
struct Staged<T, B> {
    /// `None` for records created in this snapshot.
    base: Option<B>,
    value: T,
}

/// Pending writes of one transaction.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    partners: BTreeMap<String, Staged<PartnerRecord, i64>>,
    selections: HashMap<String, Vec<Selection>>,
    requests: Vec<Staged<ReconfigurationRequest, RequestStatus>>,
    /// Status of each request as first read through this snapshot.
    request_reads: HashMap<String, RequestStatus>,
    indicators: BTreeMap<String, Staged<IndicatorRecord, i64>>,
    catalogs: Vec<Catalog>,
}

impl MemorySnapshot {
    fn request_mut(
        &mut self,
        request_id: &str,
    ) -> Option<&mut Staged<ReconfigurationRequest, RequestStatus>> {
        self.requests.iter_mut().find(|s| s.value.id == request_id)
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every storage call by `latency`, to exercise caller timeouts.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StorageError> {
        self.inner
            .lock()
            .map_err(|e| StorageError::Backend(format!("memory storage lock poisoned: {e}")))
    }

    fn current_partner(
        &self,
        snapshot: &MemorySnapshot,
        partner_id: &str,
    ) -> Result<PartnerRecord, StorageError> {
        if let Some(staged) = snapshot.partners.get(partner_id) {
            return Ok(staged.value.clone());
        }
        self.lock()?
            .partners
            .get(partner_id)
            .cloned()
            .ok_or_else(|| StorageError::PartnerNotFound {
                partner_id: partner_id.to_string(),
            })
    }

    fn current_indicator(
        &self,
        snapshot: &MemorySnapshot,
        indicator_id: &str,
    ) -> Result<IndicatorRecord, StorageError> {
        if let Some(staged) = snapshot.indicators.get(indicator_id) {
            return Ok(staged.value.clone());
        }
        self.lock()?
            .indicators
            .get(indicator_id)
            .cloned()
            .ok_or_else(|| StorageError::IndicatorNotFound {
                indicator_id: indicator_id.to_string(),
            })
    }

    /// Check every staged write against committed state.
    fn validate_commit(inner: &Inner, snapshot: &MemorySnapshot) -> Result<(), StorageError> {
        for (id, staged) in &snapshot.partners {
            let committed = inner.partners.get(id).map(|r| r.version);
            match (staged.base, committed) {
                (None, Some(_)) => {
                    return Err(StorageError::AlreadyInitialized {
                        kind: "partner",
                        id: id.clone(),
                    })
                }
                (Some(base), found) if found != Some(base) => {
                    return Err(StorageError::ConcurrentConflict {
                        kind: "partner",
                        id: id.clone(),
                        expected_version: base,
                    })
                }
                _ => {}
            }
        }

        for (id, staged) in &snapshot.indicators {
            let committed = inner.indicators.get(id).map(|r| r.version);
            match (staged.base, committed) {
                (None, Some(_)) => {
                    return Err(StorageError::AlreadyInitialized {
                        kind: "indicator",
                        id: id.clone(),
                    })
                }
                (Some(base), found) if found != Some(base) => {
                    return Err(StorageError::ConcurrentConflict {
                        kind: "indicator",
                        id: id.clone(),
                        expected_version: base,
                    })
                }
                _ => {}
            }
        }

        for staged in &snapshot.requests {
            let committed = inner.request(&staged.value.id).map(|r| r.status);
            match (staged.base, committed) {
                (None, Some(_)) => {
                    return Err(StorageError::AlreadyInitialized {
                        kind: "reconfiguration_request",
                        id: staged.value.id.clone(),
                    })
                }
                (Some(base), found) if found != Some(base) => {
                    return Err(StorageError::ConcurrentConflict {
                        kind: "reconfiguration_request",
                        id: staged.value.id.clone(),
                        expected_version: 0,
                    })
                }
                _ => {}
            }
        }

        // At most one pending request per partner, over the merged view.
        let mut touched: Vec<&str> = snapshot
            .requests
            .iter()
            .filter(|s| s.value.status == RequestStatus::Pending)
            .map(|s| s.value.partner_id.as_str())
            .collect();
        touched.sort_unstable();
        touched.dedup();
        for partner_id in touched {
            let staged_ids: Vec<&str> = snapshot
                .requests
                .iter()
                .filter(|s| s.value.partner_id == partner_id)
                .map(|s| s.value.id.as_str())
                .collect();
            let committed_pending = inner
                .requests
                .iter()
                .filter(|r| {
                    r.partner_id == partner_id
                        && r.status == RequestStatus::Pending
                        && !staged_ids.contains(&r.id.as_str())
                })
                .count();
            let staged_pending = snapshot
                .requests
                .iter()
                .filter(|s| {
                    s.value.partner_id == partner_id && s.value.status == RequestStatus::Pending
                })
                .count();
            if committed_pending + staged_pending > 1 {
                return Err(StorageError::UniqueViolation {
                    constraint: PENDING_REQUEST_UNIQUE,
                    key: partner_id.to_string(),
                });
            }
        }

        Ok(())
    }
}

#[async_trait]
impl PactStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        self.pause().await;
        Ok(MemorySnapshot::default())
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        self.pause().await;
        let mut inner = self.lock()?;
        Self::validate_commit(&inner, &snapshot)?;

        let MemorySnapshot {
            partners,
            selections,
            requests,
            indicators,
            catalogs,
            ..
        } = snapshot;

        for (id, staged) in partners {
            inner.partners.insert(id, staged.value);
        }
        for (partner_id, rows) in selections {
            inner.selections.insert(partner_id, rows);
        }
        for staged in requests {
            match inner.requests.iter_mut().find(|r| r.id == staged.value.id) {
                Some(existing) => *existing = staged.value,
                None => inner.requests.push(staged.value),
            }
        }
        for (id, staged) in indicators {
            inner.indicators.insert(id, staged.value);
        }
        for catalog in catalogs {
            inner.catalogs.insert(catalog.contract_type, catalog);
        }
        Ok(())
    }

    async fn abort_snapshot(&self, _snapshot: MemorySnapshot) -> Result<(), StorageError> {
        self.pause().await;
        Ok(())
    }

    async fn initialize_partner(
        &self,
        snapshot: &mut MemorySnapshot,
        partner: &Partner,
    ) -> Result<(), StorageError> {
        self.pause().await;
        let exists = snapshot.partners.contains_key(&partner.id)
            || self.lock()?.partners.contains_key(&partner.id);
        if exists {
            return Err(StorageError::AlreadyInitialized {
                kind: "partner",
                id: partner.id.clone(),
            });
        }
        snapshot.partners.insert(
            partner.id.clone(),
            Staged {
                base: None,
                value: PartnerRecord {
                    partner: partner.clone(),
                    version: 0,
                    updated_at: now_rfc3339(),
                },
            },
        );
        Ok(())
    }

    async fn get_partner_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        partner_id: &str,
    ) -> Result<PartnerRecord, StorageError> {
        self.pause().await;
        self.current_partner(snapshot, partner_id)
    }

    async fn update_partner(
        &self,
        snapshot: &mut MemorySnapshot,
        expected_version: i64,
        partner: &Partner,
    ) -> Result<i64, StorageError> {
        self.pause().await;
        let current = self.current_partner(snapshot, &partner.id)?;
        if current.version != expected_version {
            return Err(StorageError::ConcurrentConflict {
                kind: "partner",
                id: partner.id.clone(),
                expected_version,
            });
        }
        let new_version = expected_version + 1;
        let record = PartnerRecord {
            partner: partner.clone(),
            version: new_version,
            updated_at: now_rfc3339(),
        };
        match snapshot.partners.get_mut(&partner.id) {
            Some(staged) => staged.value = record,
            None => {
                snapshot.partners.insert(
                    partner.id.clone(),
                    Staged {
                        base: Some(expected_version),
                        value: record,
                    },
                );
            }
        }
        Ok(new_version)
    }

    async fn get_selections_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        partner_id: &str,
    ) -> Result<Vec<Selection>, StorageError> {
        self.pause().await;
        if let Some(rows) = snapshot.selections.get(partner_id) {
            return Ok(rows.clone());
        }
        Ok(self
            .lock()?
            .selections
            .get(partner_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_selections(
        &self,
        snapshot: &mut MemorySnapshot,
        partner_id: &str,
        selections: Vec<Selection>,
    ) -> Result<(), StorageError> {
        self.pause().await;
        self.current_partner(snapshot, partner_id)?;

        let mut seen: Vec<&str> = Vec::with_capacity(selections.len());
        for s in &selections {
            if s.partner_id != partner_id || seen.contains(&s.deliverable_id.as_str()) {
                return Err(StorageError::UniqueViolation {
                    constraint: SELECTION_UNIQUE,
                    key: format!("{}/{}", s.partner_id, s.deliverable_id),
                });
            }
            seen.push(&s.deliverable_id);
        }

        snapshot
            .selections
            .insert(partner_id.to_string(), selections);
        Ok(())
    }

    async fn insert_reconfiguration_request(
        &self,
        snapshot: &mut MemorySnapshot,
        request: ReconfigurationRequest,
    ) -> Result<(), StorageError> {
        self.pause().await;
        let exists = snapshot.request_mut(&request.id).is_some()
            || self.lock()?.request(&request.id).is_some();
        if exists {
            return Err(StorageError::AlreadyInitialized {
                kind: "reconfiguration_request",
                id: request.id,
            });
        }
        snapshot.requests.push(Staged {
            base: None,
            value: request,
        });
        Ok(())
    }

    async fn get_reconfiguration_request_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        request_id: &str,
    ) -> Result<ReconfigurationRequest, StorageError> {
        self.pause().await;
        if let Some(staged) = snapshot.request_mut(request_id) {
            return Ok(staged.value.clone());
        }
        let request = self
            .lock()?
            .request(request_id)
            .cloned()
            .ok_or_else(|| StorageError::RequestNotFound {
                request_id: request_id.to_string(),
            })?;
        snapshot
            .request_reads
            .entry(request.id.clone())
            .or_insert(request.status);
        Ok(request)
    }

    async fn update_reconfiguration_request(
        &self,
        snapshot: &mut MemorySnapshot,
        request: ReconfigurationRequest,
    ) -> Result<(), StorageError> {
        self.pause().await;
        if let Some(staged) = snapshot.request_mut(&request.id) {
            staged.value = request;
            return Ok(());
        }
        let committed = self
            .lock()?
            .request(&request.id)
            .map(|r| r.status)
            .ok_or_else(|| StorageError::RequestNotFound {
                request_id: request.id.clone(),
            })?;
        let base = snapshot
            .request_reads
            .get(&request.id)
            .copied()
            .unwrap_or(committed);
        snapshot.requests.push(Staged {
            base: Some(base),
            value: request,
        });
        Ok(())
    }

    async fn initialize_indicator(
        &self,
        snapshot: &mut MemorySnapshot,
        indicator: &Indicator,
    ) -> Result<(), StorageError> {
        self.pause().await;
        let exists = snapshot.indicators.contains_key(&indicator.id)
            || self.lock()?.indicators.contains_key(&indicator.id);
        if exists {
            return Err(StorageError::AlreadyInitialized {
                kind: "indicator",
                id: indicator.id.clone(),
            });
        }
        snapshot.indicators.insert(
            indicator.id.clone(),
            Staged {
                base: None,
                value: IndicatorRecord {
                    indicator: indicator.clone(),
                    version: 0,
                    updated_at: now_rfc3339(),
                },
            },
        );
        Ok(())
    }

    async fn get_indicator_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        indicator_id: &str,
    ) -> Result<IndicatorRecord, StorageError> {
        self.pause().await;
        self.current_indicator(snapshot, indicator_id)
    }

    async fn update_indicator(
        &self,
        snapshot: &mut MemorySnapshot,
        expected_version: i64,
        indicator: &Indicator,
    ) -> Result<i64, StorageError> {
        self.pause().await;
        let current = self.current_indicator(snapshot, &indicator.id)?;
        if current.version != expected_version {
            return Err(StorageError::ConcurrentConflict {
                kind: "indicator",
                id: indicator.id.clone(),
                expected_version,
            });
        }
        let new_version = expected_version + 1;
        let record = IndicatorRecord {
            indicator: indicator.clone(),
            version: new_version,
            updated_at: now_rfc3339(),
        };
        match snapshot.indicators.get_mut(&indicator.id) {
            Some(staged) => staged.value = record,
            None => {
                snapshot.indicators.insert(
                    indicator.id.clone(),
                    Staged {
                        base: Some(expected_version),
                        value: record,
                    },
                );
            }
        }
        Ok(new_version)
    }

    async fn replace_catalog(
        &self,
        snapshot: &mut MemorySnapshot,
        catalog: Catalog,
    ) -> Result<(), StorageError> {
        self.pause().await;
        snapshot
            .catalogs
            .retain(|c| c.contract_type != catalog.contract_type);
        snapshot.catalogs.push(catalog);
        Ok(())
    }

    async fn get_partner(&self, partner_id: &str) -> Result<PartnerRecord, StorageError> {
        self.pause().await;
        self.lock()?
            .partners
            .get(partner_id)
            .cloned()
            .ok_or_else(|| StorageError::PartnerNotFound {
                partner_id: partner_id.to_string(),
            })
    }

    async fn list_selections(&self, partner_id: &str) -> Result<Vec<Selection>, StorageError> {
        self.pause().await;
        let inner = self.lock()?;
        if !inner.partners.contains_key(partner_id) {
            return Err(StorageError::PartnerNotFound {
                partner_id: partner_id.to_string(),
            });
        }
        Ok(inner.selections.get(partner_id).cloned().unwrap_or_default())
    }

    async fn get_reconfiguration_request(
        &self,
        request_id: &str,
    ) -> Result<ReconfigurationRequest, StorageError> {
        self.pause().await;
        self.lock()?
            .request(request_id)
            .cloned()
            .ok_or_else(|| StorageError::RequestNotFound {
                request_id: request_id.to_string(),
            })
    }

    async fn list_reconfiguration_requests(
        &self,
        partner_id: Option<&str>,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ReconfigurationRequest>, StorageError> {
        self.pause().await;
        Ok(self
            .lock()?
            .requests
            .iter()
            .filter(|r| partner_id.map_or(true, |p| r.partner_id == p))
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect())
    }

    async fn get_indicator(&self, indicator_id: &str) -> Result<IndicatorRecord, StorageError> {
        self.pause().await;
        self.lock()?
            .indicators
            .get(indicator_id)
            .cloned()
            .ok_or_else(|| StorageError::IndicatorNotFound {
                indicator_id: indicator_id.to_string(),
            })
    }

    async fn list_indicators(
        &self,
        contract_type: Option<ContractType>,
    ) -> Result<Vec<IndicatorRecord>, StorageError> {
        self.pause().await;
        Ok(self
            .lock()?
            .indicators
            .values()
            .filter(|r| contract_type.map_or(true, |ct| r.indicator.contract_type == ct))
            .cloned()
            .collect())
    }

    async fn get_catalog(
        &self,
        contract_type: ContractType,
    ) -> Result<Option<Catalog>, StorageError> {
        self.pause().await;
        Ok(self.lock()?.catalogs.get(&contract_type).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::run_conformance_suite;

    #[tokio::test]
    async fn memory_storage_passes_conformance() {
        let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
        assert_eq!(report.failed, 0, "{report}");
        assert!(report.total > 0);
    }

    #[tokio::test]
    async fn latency_delays_calls() {
        let storage = MemoryStorage::with_latency(Duration::from_millis(50));
        let started = std::time::Instant::now();
        let _ = storage.begin_snapshot().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
