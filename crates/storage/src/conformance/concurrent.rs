//! Import lock conformance tests.
//!
//! These spawn tasks against a shared `Arc<S>` and verify that the lock
//! serializes writers and hands the committed state to the next holder.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{party_id, record, seed, TestResult, TEST_LOCK_ID};
use crate::{ConstituencyResults, StorageError, TallyStorage};

const WRITERS: usize = 6;
const BATCHES: i64 = 20;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "lock_blocks_second_holder",
            lock_blocks_second_holder(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "lock_released_on_abort",
            lock_released_on_abort(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "lock_is_reentrant",
            lock_is_reentrant(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "serialized_writers_last_commit_wins",
            serialized_writers_last_commit_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "reads_not_blocked_by_lock",
            reads_not_blocked_by_lock(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "constituency_results_see_whole_batch",
            constituency_results_see_whole_batch(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "constituency_results_never_split_a_batch",
            constituency_results_never_split_a_batch(factory).await,
        ),
    ]
}

async fn lock_blocks_second_holder<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut first = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin first: {e}"))?;
    storage
        .acquire_import_lock(&mut first, TEST_LOCK_ID)
        .await
        .map_err(|e| format!("lock first: {e}"))?;
    storage
        .insert_constituency(&mut first, "Riverside")
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let acquired = Arc::new(AtomicBool::new(false));
    let waiter = {
        let storage = Arc::clone(&storage);
        let acquired = Arc::clone(&acquired);
        tokio::spawn(async move {
            let mut snap = storage.begin_snapshot().await?;
            storage.acquire_import_lock(&mut snap, TEST_LOCK_ID).await?;
            acquired.store(true, Ordering::SeqCst);
            let seen = storage.load_constituency_ids(&mut snap).await?;
            storage.abort_snapshot(snap).await?;
            Ok::<_, StorageError>(seen)
        })
    };

    tokio::time::sleep(Duration::from_millis(150)).await;
    if acquired.load(Ordering::SeqCst) {
        return Err("second snapshot took the lock while the first held it".to_string());
    }

    storage
        .commit_snapshot(first)
        .await
        .map_err(|e| format!("commit first: {e}"))?;

    let seen = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .map_err(|_| "waiter never acquired the released lock".to_string())?
        .map_err(|e| format!("waiter panicked: {e}"))?
        .map_err(|e| format!("waiter: {e}"))?;
    if !seen.contains_key("Riverside") {
        return Err("next lock holder did not see the previous commit".to_string());
    }
    Ok(())
}

async fn lock_released_on_abort<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut first = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .acquire_import_lock(&mut first, TEST_LOCK_ID)
        .await
        .map_err(|e| format!("lock: {e}"))?;
    storage
        .abort_snapshot(first)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    let mut second = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin again: {e}"))?;
    tokio::time::timeout(
        Duration::from_secs(5),
        storage.acquire_import_lock(&mut second, TEST_LOCK_ID),
    )
    .await
    .map_err(|_| "lock still held after abort".to_string())?
    .map_err(|e| format!("relock: {e}"))?;
    storage
        .abort_snapshot(second)
        .await
        .map_err(|e| format!("abort again: {e}"))?;
    Ok(())
}

async fn lock_is_reentrant<S, F, Fut>(factory: &F) -> Result<(), String>
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
    for attempt in 0..2 {
        tokio::time::timeout(
            Duration::from_secs(5),
            storage.acquire_import_lock(&mut snap, TEST_LOCK_ID),
        )
        .await
        .map_err(|_| format!("acquire #{attempt} deadlocked"))?
        .map_err(|e| format!("acquire #{attempt}: {e}"))?;
    }
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;
    Ok(())
}

async fn serialized_writers_last_commit_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let ids = seed(&*storage, &["LAB"]).await?;
    let lab = party_id(&ids, "LAB")?;

    // Commit order is the order in which writers entered the critical section.
    let order = Arc::new(Mutex::new(Vec::new()));
    let sequence = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for writer in 0..WRITERS {
        let storage = Arc::clone(&storage);
        let order = Arc::clone(&order);
        let sequence = Arc::clone(&sequence);
        handles.push(tokio::spawn(async move {
            let votes = 100 * (writer as i64 + 1);
            let mut snap = storage.begin_snapshot().await?;
            storage.acquire_import_lock(&mut snap, TEST_LOCK_ID).await?;
            let known = storage.load_constituency_ids(&mut snap).await?;
            let cid = match known.get("Oakdale") {
                Some(id) => *id,
                None => storage.insert_constituency(&mut snap, "Oakdale").await?,
            };
            storage.upsert_result(&mut snap, cid, lab, votes).await?;
            let turn = sequence.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut order) = order.lock() {
                order.push((turn, votes));
            }
            storage.commit_snapshot(snap).await?;
            Ok::<_, StorageError>(())
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("writer panicked: {e}"))?
            .map_err(|e| format!("writer failed: {e}"))?;
    }

    let expected = order
        .lock()
        .map_err(|_| "order log poisoned".to_string())?
        .iter()
        .max_by_key(|(turn, _)| *turn)
        .map(|(_, votes)| *votes)
        .ok_or("no writer recorded its turn")?;

    let results = storage
        .list_results()
        .await
        .map_err(|e| format!("results: {e}"))?;
    match results.as_slice() {
        [r] if r.votes == expected && r.constituency == "Oakdale" => Ok(()),
        other => Err(format!(
            "expected a single Oakdale row with {expected} votes, got {other:?}"
        )),
    }
}

async fn reads_not_blocked_by_lock<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let ids = seed(&storage, &["LAB"]).await?;
    let lab = party_id(&ids, "LAB")?;
    record(&storage, "Riverside", lab, 10).await?;

    let mut holder = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .acquire_import_lock(&mut holder, TEST_LOCK_ID)
        .await
        .map_err(|e| format!("lock: {e}"))?;

    let reads = tokio::time::timeout(Duration::from_secs(5), async {
        let constituencies = storage.list_constituencies().await?;
        let results = storage.list_results().await?;
        Ok::<_, StorageError>((constituencies.len(), results.len()))
    })
    .await;

    storage
        .abort_snapshot(holder)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    match reads {
        Ok(Ok((1, 1))) => Ok(()),
        Ok(Ok(counts)) => Err(format!("unexpected read counts {counts:?}")),
        Ok(Err(e)) => Err(format!("read failed: {e}")),
        Err(_) => Err("reads blocked while the import lock was held".to_string()),
    }
}

fn listing(grouped: &[ConstituencyResults]) -> Vec<(String, Vec<i64>)> {
    grouped
        .iter()
        .map(|g| {
            (
                g.constituency.name.clone(),
                g.results.iter().map(|r| r.votes).collect(),
            )
        })
        .collect()
}

/// One batch updates an existing constituency and creates a new one.
async fn constituency_results_see_whole_batch<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let ids = seed(&storage, &["LAB"]).await?;
    let lab = party_id(&ids, "LAB")?;
    let riverside = record(&storage, "Riverside", lab, 1).await?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .acquire_import_lock(&mut snap, TEST_LOCK_ID)
        .await
        .map_err(|e| format!("lock: {e}"))?;
    storage
        .upsert_result(&mut snap, riverside, lab, 5)
        .await
        .map_err(|e| format!("upsert riverside: {e}"))?;
    let oakdale = storage
        .insert_constituency(&mut snap, "Oakdale")
        .await
        .map_err(|e| format!("insert oakdale: {e}"))?;
    storage
        .upsert_result(&mut snap, oakdale, lab, 7)
        .await
        .map_err(|e| format!("upsert oakdale: {e}"))?;

    let before = storage
        .constituency_results()
        .await
        .map_err(|e| format!("read before commit: {e}"));
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;
    let after = storage
        .constituency_results()
        .await
        .map_err(|e| format!("read after commit: {e}"))?;

    let before = listing(&before?);
    if before != [("Riverside".to_string(), vec![1])] {
        return Err(format!("read during the batch saw {before:?}"));
    }
    let after = listing(&after);
    let expected = [
        ("Oakdale".to_string(), vec![7]),
        ("Riverside".to_string(), vec![5]),
    ];
    if after != expected {
        return Err(format!("read after the batch saw {after:?}"));
    }
    Ok(())
}

/// Batch `k` sets Riverside to `k` votes and creates "Batch k". Every
/// listing must therefore show exactly as many batch constituencies as
/// Riverside has votes.
async fn constituency_results_never_split_a_batch<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TallyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let ids = seed(&*storage, &["LAB"]).await?;
    let lab = party_id(&ids, "LAB")?;
    let riverside = record(&*storage, "Riverside", lab, 0).await?;

    let writer = {
        let storage = Arc::clone(&storage);
        tokio::spawn(async move {
            for batch in 1..=BATCHES {
                let mut snap = storage.begin_snapshot().await?;
                storage.acquire_import_lock(&mut snap, TEST_LOCK_ID).await?;
                storage.upsert_result(&mut snap, riverside, lab, batch).await?;
                let cid = storage
                    .insert_constituency(&mut snap, &format!("Batch {batch:02}"))
                    .await?;
                storage.upsert_result(&mut snap, cid, lab, batch).await?;
                storage.commit_snapshot(snap).await?;
                tokio::task::yield_now().await;
            }
            Ok::<_, StorageError>(())
        })
    };

    let mut reads = 0usize;
    loop {
        let finished = writer.is_finished();
        let grouped = storage
            .constituency_results()
            .await
            .map_err(|e| format!("read: {e}"))?;
        reads += 1;
        let riverside_votes = grouped
            .iter()
            .find(|g| g.constituency.name == "Riverside")
            .and_then(|g| g.results.first())
            .map(|r| r.votes)
            .ok_or("Riverside missing from listing")?;
        let batches = grouped
            .iter()
            .filter(|g| g.constituency.name.starts_with("Batch "))
            .count() as i64;
        if batches != riverside_votes {
            return Err(format!(
                "read {reads} saw Riverside at {riverside_votes} votes but {batches} batch constituencies"
            ));
        }
        if finished {
            break;
        }
        tokio::task::yield_now().await;
    }

    writer
        .await
        .map_err(|e| format!("writer panicked: {e}"))?
        .map_err(|e| format!("writer failed: {e}"))?;
    Ok(())
}
