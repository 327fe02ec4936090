//! Snapshot isolation conformance tests.

use std::future::Future;

use super::{party_id, seed, TestResult};
use crate::TallyStorage;

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "snapshot",
            "snapshot_reads_own_writes",
            snapshot_reads_own_writes(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "uncommitted_writes_invisible",
            uncommitted_writes_invisible(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "commit_makes_writes_visible",
            commit_makes_writes_visible(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "abort_discards_writes",
            abort_discards_writes(factory).await,
        ),
    ]
}

async fn snapshot_reads_own_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let id = storage
        .insert_constituency(&mut snap, "Riverside")
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let seen = storage
        .load_constituency_ids(&mut snap)
        .await
        .map_err(|e| format!("load: {e}"))?;
    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    if seen.get("Riverside") != Some(&id) {
        return Err(format!("snapshot did not see its own insert: {seen:?}"));
    }
    Ok(())
}

async fn uncommitted_writes_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let ids = seed(&storage, &["LAB"]).await?;
    let lab = party_id(&ids, "LAB")?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let cid = storage
        .insert_constituency(&mut snap, "Riverside")
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .upsert_result(&mut snap, cid, lab, 1200)
        .await
        .map_err(|e| format!("upsert: {e}"))?;

    let constituencies = storage
        .list_constituencies()
        .await
        .map_err(|e| format!("list: {e}"))?;
    let results = storage
        .list_results()
        .await
        .map_err(|e| format!("results: {e}"))?;

    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    if !constituencies.is_empty() || !results.is_empty() {
        return Err("uncommitted writes visible outside the snapshot".to_string());
    }
    Ok(())
}

async fn commit_makes_writes_visible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let ids = seed(&storage, &["LAB"]).await?;
    let lab = party_id(&ids, "LAB")?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let cid = storage
        .insert_constituency(&mut snap, "Riverside")
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .upsert_result(&mut snap, cid, lab, 1200)
        .await
        .map_err(|e| format!("upsert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let found = storage
        .find_constituency("Riverside")
        .await
        .map_err(|e| format!("find: {e}"))?
        .ok_or("committed constituency not found")?;
    if found.id != cid {
        return Err(format!("id changed across commit: {} vs {cid}", found.id));
    }
    let results = storage
        .results_for_constituency(cid)
        .await
        .map_err(|e| format!("results: {e}"))?;
    match results.as_slice() {
        [r] if r.votes == 1200 && r.party_code == "LAB" => Ok(()),
        other => Err(format!("unexpected results after commit: {other:?}")),
    }
}

async fn abort_discards_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_constituency(&mut snap, "Riverside")
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    if storage
        .find_constituency("Riverside")
        .await
        .map_err(|e| format!("find: {e}"))?
        .is_some()
    {
        return Err("aborted insert survived".to_string());
    }

    // The name is free again after the abort.
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin again: {e}"))?;
    storage
        .insert_constituency(&mut snap, "Riverside")
        .await
        .map_err(|e| format!("reinsert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;
    Ok(())
}
