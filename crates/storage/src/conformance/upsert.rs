//! Result upsert and constraint conformance tests.

use std::future::Future;
use std::time::Duration;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::{party_id, record, seed, TestResult};
use crate::{StorageError, TallyStorage};

pub(super) async fn run_upsert_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "upsert",
            "upsert_creates_result",
            upsert_creates_result(factory).await,
        ),
        TestResult::from_result(
            "upsert",
            "upsert_overwrites_in_place",
            upsert_overwrites_in_place(factory).await,
        ),
        TestResult::from_result(
            "upsert",
            "upsert_refreshes_timestamp",
            upsert_refreshes_timestamp(factory).await,
        ),
        TestResult::from_result(
            "upsert",
            "duplicate_constituency_rejected",
            duplicate_constituency_rejected(factory).await,
        ),
        TestResult::from_result(
            "upsert",
            "unknown_party_rejected",
            unknown_party_rejected(factory).await,
        ),
        TestResult::from_result(
            "upsert",
            "constituency_names_case_sensitive",
            constituency_names_case_sensitive(factory).await,
        ),
    ]
}

fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|e| format!("bad timestamp {raw:?}: {e}"))
}

async fn upsert_creates_result<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let ids = seed(&storage, &["LAB", "CON"]).await?;
    let lab = party_id(&ids, "LAB")?;
    let con = party_id(&ids, "CON")?;

    let cid = record(&storage, "Riverside", lab, 1200).await?;
    record(&storage, "Riverside", con, 900).await?;

    let mut results = storage
        .results_for_constituency(cid)
        .await
        .map_err(|e| format!("results: {e}"))?;
    results.sort_by(|a, b| a.party_code.cmp(&b.party_code));
    let got: Vec<(&str, i64)> = results
        .iter()
        .map(|r| (r.party_code.as_str(), r.votes))
        .collect();
    if got != [("CON", 900), ("LAB", 1200)] {
        return Err(format!("unexpected results: {got:?}"));
    }
    for r in &results {
        parse_timestamp(&r.last_updated)?;
        if r.constituency != "Riverside" || r.constituency_id != cid {
            return Err(format!("result not joined to its constituency: {r:?}"));
        }
    }
    Ok(())
}

async fn upsert_overwrites_in_place<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let ids = seed(&storage, &["LAB"]).await?;
    let lab = party_id(&ids, "LAB")?;

    record(&storage, "Riverside", lab, 1200).await?;
    record(&storage, "Riverside", lab, 800).await?;

    // Overwrite twice inside one snapshot as well.
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let cid = *storage
        .load_constituency_ids(&mut snap)
        .await
        .map_err(|e| format!("load: {e}"))?
        .get("Riverside")
        .ok_or("Riverside missing")?;
    for votes in [10, 20] {
        storage
            .upsert_result(&mut snap, cid, lab, votes)
            .await
            .map_err(|e| format!("upsert {votes}: {e}"))?;
    }
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let results = storage
        .list_results()
        .await
        .map_err(|e| format!("results: {e}"))?;
    match results.as_slice() {
        [r] if r.votes == 20 => Ok(()),
        other => Err(format!("expected a single overwritten row, got {other:?}")),
    }
}

async fn upsert_refreshes_timestamp<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let ids = seed(&storage, &["LAB"]).await?;
    let lab = party_id(&ids, "LAB")?;

    let cid = record(&storage, "Riverside", lab, 1200).await?;
    let first = storage
        .results_for_constituency(cid)
        .await
        .map_err(|e| format!("results: {e}"))?;
    let first = parse_timestamp(&first.first().ok_or("no result row")?.last_updated)?;

    tokio::time::sleep(Duration::from_millis(20)).await;
    record(&storage, "Riverside", lab, 1300).await?;

    let second = storage
        .results_for_constituency(cid)
        .await
        .map_err(|e| format!("results: {e}"))?;
    let second = parse_timestamp(&second.first().ok_or("no result row")?.last_updated)?;
    if second <= first {
        return Err(format!("timestamp not refreshed: {first} then {second}"));
    }
    Ok(())
}

async fn duplicate_constituency_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .insert_constituency(&mut snap, "Oakdale")
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let result = storage.insert_constituency(&mut snap, "Oakdale").await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::ConstituencyExists { name }) if name == "Oakdale" => Ok(()),
        Err(other) => Err(format!("expected ConstituencyExists, got {other}")),
        Ok(id) => Err(format!("duplicate constituency accepted with id {id}")),
    }
}

async fn unknown_party_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let ids = seed(&storage, &["LAB"]).await?;
    let missing = ids.values().copied().max().unwrap_or(0) + 1000;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let cid = storage
        .insert_constituency(&mut snap, "Riverside")
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let result = storage.upsert_result(&mut snap, cid, missing, 5).await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::UnknownParty { party_id }) if party_id == missing => Ok(()),
        Err(other) => Err(format!("expected UnknownParty, got {other}")),
        Ok(()) => Err("result for an unseeded party accepted".to_string()),
    }
}

async fn constituency_names_case_sensitive<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let ids = seed(&storage, &["LAB"]).await?;
    let lab = party_id(&ids, "LAB")?;

    let upper = record(&storage, "Riverside", lab, 1).await?;
    let lower = record(&storage, "riverside", lab, 2).await?;
    if upper == lower {
        return Err("names differing only in case share an id".to_string());
    }
    let listed = storage
        .list_constituencies()
        .await
        .map_err(|e| format!("list: {e}"))?;
    if listed.len() != 2 {
        return Err(format!("expected 2 constituencies, got {}", listed.len()));
    }
    Ok(())
}
