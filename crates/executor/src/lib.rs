//! pact-executor: the stateful engine of the performance agreement.
//!
//! [`Executor`] drives a [`PactStorage`] backend through every partner,
//! administrator and content-admin operation:
//!
//! - partner lifecycle (`mark_read`, `mark_signed`, `begin_configuration`,
//!   `finalize_configuration`, `submit`)
//! - the selection ledger (`record_selections`, `get_selections`)
//! - the reconfiguration workflow (`request_reconfiguration`, `approve`,
//!   `reject`, `list_pending`, `history`)
//! - indicator administration and evaluation
//! - the deliverable catalog and its cache
//!
//! Every state-changing operation reads, decides and writes inside one
//! storage snapshot conditional on the versions it read. Conflicting commits
//! are retried a bounded number of times; each storage call is bounded by a
//! timeout and surfaces `PactError::Persistence` instead of hanging.

mod catalog;
mod indicators;
mod ledger;
mod lifecycle;
mod reconfiguration;
mod settings;
mod txn;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pact_core::{Catalog, ContractType};
use pact_storage::PactStorage;
use tokio::sync::RwLock;

pub use settings::ExecutorSettings;

/// The agreement engine over a storage backend.
pub struct Executor<S: PactStorage> {
    storage: Arc<S>,
    settings: ExecutorSettings,
    /// Invalidated only by `replace_catalog`.
    catalogs: RwLock<HashMap<ContractType, Arc<Catalog>>>,
    conflict_retries: AtomicU64,
}

impl<S: PactStorage> Executor<S> {
    pub fn new(storage: Arc<S>, settings: ExecutorSettings) -> Self {
        Self {
            storage,
            settings,
            catalogs: RwLock::new(HashMap::new()),
            conflict_retries: AtomicU64::new(0),
        }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Attempts re-run after losing an optimistic race, since construction.
    pub fn conflict_retries(&self) -> u64 {
        self.conflict_retries.load(Ordering::Relaxed)
    }
}
