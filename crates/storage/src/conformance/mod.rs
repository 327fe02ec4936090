//! Conformance test suite for `TallyStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any `TallyStorage`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Seeding**: party insertion, renames, idempotence
//! - **Snapshot isolation**: uncommitted writes invisible, committed writes visible
//! - **Upsert**: one row per (constituency, party), overwrite in place, constraints
//! - **Queries**: ordering and exact-name lookup
//! - **Concurrency**: the import lock serializes writers and hands over state
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use tally_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_storage().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod query;
mod seed;
mod snapshot;
mod upsert;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use tally_core::Party;

use crate::TallyStorage;

/// Lock id used by the concurrency tests; distinct from the import lock.
const TEST_LOCK_ID: i64 = 777_001;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "seed", "snapshot", "upsert").
    pub category: String,
    /// Test name (e.g. "upsert_overwrites_in_place").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
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
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(seed::run_seed_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(upsert::run_upsert_tests(&factory).await);
    results.extend(query::run_query_tests(&factory).await);
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

// ── Helpers ──────────────────────────────────────────────────────────────────

fn parties(codes: &[&str]) -> Vec<Party> {
    codes
        .iter()
        .map(|code| Party::new(*code, format!("{code} Party")))
        .collect()
}

/// Seed the given party codes in their own snapshot and return code -> id.
async fn seed<S: TallyStorage>(storage: &S, codes: &[&str]) -> Result<HashMap<String, i64>, String> {
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin seed: {e}"))?;
    storage
        .upsert_parties(&mut snap, &parties(codes))
        .await
        .map_err(|e| format!("seed: {e}"))?;
    let ids = storage
        .load_party_ids(&mut snap)
        .await
        .map_err(|e| format!("load party ids: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit seed: {e}"))?;
    Ok(ids)
}

/// Create a constituency and upsert one result in a single committed snapshot.
async fn record<S: TallyStorage>(
    storage: &S,
    constituency: &str,
    party_id: i64,
    votes: i64,
) -> Result<i64, String> {
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let existing = storage
        .load_constituency_ids(&mut snap)
        .await
        .map_err(|e| format!("load constituencies: {e}"))?;
    let constituency_id = match existing.get(constituency) {
        Some(id) => *id,
        None => storage
            .insert_constituency(&mut snap, constituency)
            .await
            .map_err(|e| format!("insert constituency: {e}"))?,
    };
    storage
        .upsert_result(&mut snap, constituency_id, party_id, votes)
        .await
        .map_err(|e| format!("upsert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;
    Ok(constituency_id)
}

fn party_id(ids: &HashMap<String, i64>, code: &str) -> Result<i64, String> {
    ids.get(code)
        .copied()
        .ok_or_else(|| format!("party {code} missing after seed"))
}
