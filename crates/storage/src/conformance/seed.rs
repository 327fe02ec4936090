//! Party seeding conformance tests.

use std::future::Future;

use tally_core::Party;

use super::{parties, seed, TestResult};
use crate::TallyStorage;

pub(super) async fn run_seed_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "seed",
            "seed_inserts_every_party",
            seed_inserts_every_party(factory).await,
        ),
        TestResult::from_result(
            "seed",
            "seed_is_idempotent",
            seed_is_idempotent(factory).await,
        ),
        TestResult::from_result(
            "seed",
            "seed_refreshes_display_name",
            seed_refreshes_display_name(factory).await,
        ),
        TestResult::from_result(
            "seed",
            "seed_keeps_unlisted_parties",
            seed_keeps_unlisted_parties(factory).await,
        ),
        TestResult::from_result(
            "seed",
            "parties_listed_by_code",
            parties_listed_by_code(factory).await,
        ),
    ]
}

async fn seed_inserts_every_party<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let ids = seed(&storage, &["LAB", "CON", "LD"]).await?;
    if ids.len() != 3 {
        return Err(format!("expected 3 party ids, got {}", ids.len()));
    }
    let listed = storage
        .list_parties()
        .await
        .map_err(|e| format!("list: {e}"))?;
    if listed.len() != 3 {
        return Err(format!("expected 3 parties listed, got {}", listed.len()));
    }
    for p in &listed {
        if ids.get(&p.code) != Some(&p.id) {
            return Err(format!("id mismatch for {}", p.code));
        }
        if p.name != format!("{} Party", p.code) {
            return Err(format!("unexpected name {:?} for {}", p.name, p.code));
        }
    }
    Ok(())
}

async fn seed_is_idempotent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let first = seed(&storage, &["LAB", "CON"]).await?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let outcome = storage
        .upsert_parties(&mut snap, &parties(&["LAB", "CON"]))
        .await
        .map_err(|e| format!("reseed: {e}"))?;
    let second = storage
        .load_party_ids(&mut snap)
        .await
        .map_err(|e| format!("load: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    if outcome.inserted != 0 || outcome.renamed != 0 {
        return Err(format!("reseed changed rows: {outcome:?}"));
    }
    if first != second {
        return Err("party ids changed on reseed".to_string());
    }
    Ok(())
}

async fn seed_refreshes_display_name<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let before = seed(&storage, &["LAB"]).await?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let outcome = storage
        .upsert_parties(&mut snap, &[Party::new("LAB", "Labour Party")])
        .await
        .map_err(|e| format!("rename: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    if outcome.renamed != 1 || outcome.inserted != 0 {
        return Err(format!("expected one rename, got {outcome:?}"));
    }
    let listed = storage
        .list_parties()
        .await
        .map_err(|e| format!("list: {e}"))?;
    match listed.as_slice() {
        [p] if p.name == "Labour Party" && Some(&p.id) == before.get("LAB") => Ok(()),
        other => Err(format!("unexpected parties after rename: {other:?}")),
    }
}

async fn seed_keeps_unlisted_parties<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage, &["LAB", "CON"]).await?;
    seed(&storage, &["LAB"]).await?;
    let listed = storage
        .list_parties()
        .await
        .map_err(|e| format!("list: {e}"))?;
    if listed.len() != 2 {
        return Err(format!("expected 2 parties to remain, got {}", listed.len()));
    }
    Ok(())
}

async fn parties_listed_by_code<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage, &["SNP", "C", "LD", "G"]).await?;
    let codes: Vec<String> = storage
        .list_parties()
        .await
        .map_err(|e| format!("list: {e}"))?
        .into_iter()
        .map(|p| p.code)
        .collect();
    if codes != ["C", "G", "LD", "SNP"] {
        return Err(format!("parties not ordered by code: {codes:?}"));
    }
    Ok(())
}
