//! Conformance test suite for `PactStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any `PactStorage`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Initialization**: partner and indicator creation, duplicate detection
//! - **Error handling**: correct not-found variants
//! - **Snapshot isolation**: uncommitted writes invisible, own writes readable
//! - **Atomic commit**: all-or-nothing semantics for multi-record snapshots
//! - **Version validation / OCC**: optimistic concurrency conflict detection
//! - **Uniqueness**: one selection per deliverable, one pending request per partner
//! - **Concurrency**: racing tasks against the same records
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use pact_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn sqlite_conformance() {
//!     let report = run_conformance_suite(|| async { open_test_db().await }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod commit;
mod concurrent;
mod error;
mod init;
mod snapshot;
mod unique;
mod version;

use std::fmt;
use std::future::Future;

use pact_core::{
    BaselineCapture, BilingualText, CalculationRule, Comparison, Condition, ContractType,
    Direction, Indicator, Partner, ReconfigurationRequest, RequestStatus, RuleOutcome, Selection,
};
use rust_decimal::Decimal;

use crate::PactStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "init", "snapshot", "commit").
    pub category: String,
    /// Test name (e.g. "initialize_partner_at_version_0").
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: result.is_ok(),
            message: result.err(),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(init::run_init_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(unique::run_unique_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors and setup ───────────────────────────────────

fn make_partner(id: &str) -> Partner {
    Partner::new(id, ContractType::Full)
}

fn make_selection(partner_id: &str, deliverable_id: &str, option_id: &str) -> Selection {
    Selection {
        partner_id: partner_id.to_string(),
        deliverable_id: deliverable_id.to_string(),
        option_id: option_id.to_string(),
        baseline: BaselineCapture {
            baseline_percent: Decimal::new(937, 1),
            source: "annual report".to_string(),
            measured_on: time::macros::date!(2025 - 03 - 31),
            note: None,
        },
        recorded_at: "2025-04-01T00:00:00Z".to_string(),
    }
}

fn make_request(id: &str, partner_id: &str) -> ReconfigurationRequest {
    ReconfigurationRequest {
        id: id.to_string(),
        partner_id: partner_id.to_string(),
        contract_type: ContractType::Full,
        reason: "baseline source corrected".to_string(),
        status: RequestStatus::Pending,
        created_at: "2025-04-02T00:00:00Z".to_string(),
        resolved_at: None,
        resolved_by: None,
    }
}

fn make_indicator(id: &str) -> Indicator {
    let rule = |comparison, threshold: i64, outcome| CalculationRule {
        condition: Condition {
            comparison,
            threshold: Decimal::new(threshold, 1),
        },
        outcome,
        description: BilingualText::new("rule", "règle"),
    };
    Indicator {
        id: id.to_string(),
        contract_type: ContractType::Full,
        name: BilingualText::new("Completion rate", "Taux d'achèvement"),
        baseline: Decimal::new(937, 1),
        direction: Direction::Increase,
        rules: vec![
            rule(
                Comparison::LessThan,
                937,
                RuleOutcome::IncreaseBy(Decimal::new(13, 1)),
            ),
            rule(
                Comparison::Equal,
                937,
                RuleOutcome::IncreaseTo(Decimal::new(95, 0)),
            ),
            rule(Comparison::GreaterOrEqual, 950, RuleOutcome::Maintain),
        ],
    }
}

/// Commit a fresh partner at version 0.
async fn seed_partner<S: PactStorage>(storage: &S, id: &str) -> Result<(), String> {
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .initialize_partner(&mut snap, &make_partner(id))
        .await
        .map_err(|e| format!("init partner: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit seed: {e}"))
}

/// Commit a fresh indicator at version 0.
async fn seed_indicator<S: PactStorage>(storage: &S, id: &str) -> Result<(), String> {
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .initialize_indicator(&mut snap, &make_indicator(id))
        .await
        .map_err(|e| format!("init indicator: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit seed: {e}"))
}

/// Commit a pending request for an existing partner.
async fn seed_request<S: PactStorage>(
    storage: &S,
    id: &str,
    partner_id: &str,
) -> Result<(), String> {
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_reconfiguration_request(&mut snap, make_request(id, partner_id))
        .await
        .map_err(|e| format!("insert request: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit seed: {e}"))
}
