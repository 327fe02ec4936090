//! Committed-state query conformance tests.

use std::future::Future;

use super::{party_id, record, seed, TestResult};
use crate::TallyStorage;

pub(super) async fn run_query_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "query",
            "empty_store_lists_nothing",
            empty_store_lists_nothing(factory).await,
        ),
        TestResult::from_result(
            "query",
            "constituencies_listed_by_name",
            constituencies_listed_by_name(factory).await,
        ),
        TestResult::from_result(
            "query",
            "find_requires_exact_name",
            find_requires_exact_name(factory).await,
        ),
        TestResult::from_result(
            "query",
            "results_scoped_to_constituency",
            results_scoped_to_constituency(factory).await,
        ),
        TestResult::from_result(
            "query",
            "constituency_results_grouped_by_name",
            constituency_results_grouped_by_name(factory).await,
        ),
    ]
}

async fn empty_store_lists_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    storage.ping().await.map_err(|e| format!("ping: {e}"))?;
    let parties = storage
        .list_parties()
        .await
        .map_err(|e| format!("parties: {e}"))?;
    let constituencies = storage
        .list_constituencies()
        .await
        .map_err(|e| format!("constituencies: {e}"))?;
    let results = storage
        .list_results()
        .await
        .map_err(|e| format!("results: {e}"))?;
    if !parties.is_empty() || !constituencies.is_empty() || !results.is_empty() {
        return Err("fresh store is not empty".to_string());
    }
    Ok(())
}

async fn constituencies_listed_by_name<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let ids = seed(&storage, &["LAB"]).await?;
    let lab = party_id(&ids, "LAB")?;
    for name in ["Westfield", "Bramley", "Oakdale"] {
        record(&storage, name, lab, 1).await?;
    }
    let names: Vec<String> = storage
        .list_constituencies()
        .await
        .map_err(|e| format!("list: {e}"))?
        .into_iter()
        .map(|c| c.name)
        .collect();
    if names != ["Bramley", "Oakdale", "Westfield"] {
        return Err(format!("constituencies not ordered by name: {names:?}"));
    }
    Ok(())
}

async fn find_requires_exact_name<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let ids = seed(&storage, &["LAB"]).await?;
    let lab = party_id(&ids, "LAB")?;
    let cid = record(&storage, "Riverside", lab, 1).await?;

    let hit = storage
        .find_constituency("Riverside")
        .await
        .map_err(|e| format!("find: {e}"))?;
    if hit.map(|c| c.id) != Some(cid) {
        return Err("exact name lookup failed".to_string());
    }
    for miss in ["riverside", "Riverside ", "Nowhere"] {
        let found = storage
            .find_constituency(miss)
            .await
            .map_err(|e| format!("find {miss:?}: {e}"))?;
        if found.is_some() {
            return Err(format!("lookup of {miss:?} should miss"));
        }
    }
    Ok(())
}

async fn results_scoped_to_constituency<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let ids = seed(&storage, &["LAB", "CON"]).await?;
    let lab = party_id(&ids, "LAB")?;
    let con = party_id(&ids, "CON")?;
    let riverside = record(&storage, "Riverside", lab, 100).await?;
    record(&storage, "Riverside", con, 50).await?;
    let oakdale = record(&storage, "Oakdale", con, 70).await?;

    let scoped = storage
        .results_for_constituency(oakdale)
        .await
        .map_err(|e| format!("scoped: {e}"))?;
    match scoped.as_slice() {
        [r] if r.party_code == "CON" && r.votes == 70 && r.party_name == "CON Party" => {}
        other => return Err(format!("unexpected Oakdale results: {other:?}")),
    }
    let riverside_rows = storage
        .results_for_constituency(riverside)
        .await
        .map_err(|e| format!("scoped: {e}"))?;
    if riverside_rows.len() != 2 {
        return Err(format!("expected 2 Riverside rows, got {}", riverside_rows.len()));
    }
    let all = storage
        .list_results()
        .await
        .map_err(|e| format!("all: {e}"))?;
    if all.len() != 3 {
        return Err(format!("expected 3 rows overall, got {}", all.len()));
    }
    Ok(())
}

async fn constituency_results_grouped_by_name<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let ids = seed(&storage, &["LAB", "CON"]).await?;
    let lab = party_id(&ids, "LAB")?;
    let con = party_id(&ids, "CON")?;
    record(&storage, "Westfield", lab, 10).await?;
    record(&storage, "Westfield", con, 20).await?;
    record(&storage, "Bramley", lab, 5).await?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_constituency(&mut snap, "Appleby")
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let grouped = storage
        .constituency_results()
        .await
        .map_err(|e| format!("constituency results: {e}"))?;
    let shape: Vec<(&str, usize)> = grouped
        .iter()
        .map(|g| (g.constituency.name.as_str(), g.results.len()))
        .collect();
    if shape != [("Appleby", 0), ("Bramley", 1), ("Westfield", 2)] {
        return Err(format!("unexpected grouping {shape:?}"));
    }
    for group in &grouped {
        if let Some(stray) = group
            .results
            .iter()
            .find(|r| r.constituency_id != group.constituency.id)
        {
            return Err(format!(
                "{} listed a result of {}",
                group.constituency.name, stray.constituency
            ));
        }
    }
    Ok(())
}
