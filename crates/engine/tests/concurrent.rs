use std::sync::Arc;
use std::time::Duration;

use tally_core::{Party, PartyRegistry};
use tally_engine::{
    all_constituency_views, ingest, national_totals, seed_parties, IMPORT_LOCK_ID,
};
use tally_storage::{MemoryStorage, TallyStorage};

async fn seeded() -> (Arc<MemoryStorage>, Arc<PartyRegistry>) {
    let storage = Arc::new(MemoryStorage::new());
    let registry = Arc::new(
        PartyRegistry::new(vec![
            Party::new("LAB", "Labour Party"),
            Party::new("CON", "Conservative Party"),
        ])
        .unwrap(),
    );
    seed_parties(&*storage, &registry).await.unwrap();
    (storage, registry)
}

async fn lab_votes(storage: &MemoryStorage, constituency: &str) -> Vec<i64> {
    storage
        .list_results()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.constituency == constituency && r.party_code == "LAB")
        .map(|r| r.votes)
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reports_apply_atomically() {
    let (storage, registry) = seeded().await;

    // Each report writes the same value to both seats, in opposite orders.
    let mut handles = Vec::new();
    for votes in 1..=8 {
        let storage = Arc::clone(&storage);
        let registry = Arc::clone(&registry);
        let report = if votes % 2 == 0 {
            format!("Riverside, LAB, {votes}\nOakdale, LAB, {votes}\n")
        } else {
            format!("Oakdale, LAB, {votes}\nRiverside, LAB, {votes}\n")
        };
        handles.push(tokio::spawn(async move {
            ingest(&*storage, &registry, &report).await
        }));
    }
    for handle in handles {
        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.processed_lines, 2);
    }

    let riverside = lab_votes(&storage, "Riverside").await;
    let oakdale = lab_votes(&storage, "Oakdale").await;
    assert_eq!(riverside.len(), 1, "duplicate Riverside rows");
    assert_eq!(oakdale.len(), 1, "duplicate Oakdale rows");
    // Both seats hold the value of whichever report committed last.
    assert_eq!(riverside, oakdale);
    assert_eq!(storage.list_constituencies().await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn import_waits_for_lock_and_sees_previous_commit() {
    let (storage, registry) = seeded().await;

    let mut holder = storage.begin_snapshot().await.unwrap();
    storage
        .acquire_import_lock(&mut holder, IMPORT_LOCK_ID)
        .await
        .unwrap();
    let cid = storage
        .insert_constituency(&mut holder, "Riverside")
        .await
        .unwrap();

    let import = {
        let storage = Arc::clone(&storage);
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { ingest(&*storage, &registry, "Riverside, LAB, 42").await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!import.is_finished(), "import ran while the lock was held");

    // Reads still answer while the import waits.
    let totals = tokio::time::timeout(Duration::from_secs(2), national_totals(&*storage))
        .await
        .expect("reads must not wait for the import lock")
        .unwrap();
    assert_eq!(totals.overall.total_constituencies, 0);

    storage.commit_snapshot(holder).await.unwrap();
    import.await.unwrap().unwrap();

    // The import reused the constituency committed by the previous holder.
    let found = storage.find_constituency("Riverside").await.unwrap().unwrap();
    assert_eq!(found.id, cid);
    assert_eq!(lab_votes(&storage, "Riverside").await, vec![42]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn listing_never_shows_half_a_report() {
    let (storage, registry) = seeded().await;
    ingest(&*storage, &registry, "Riverside, LAB, 0").await.unwrap();

    // Report k moves Riverside to k votes and introduces "Seat k".
    let importer = {
        let storage = Arc::clone(&storage);
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            for k in 1..=25 {
                let report = format!("Riverside, LAB, {k}\nSeat {k:02}, LAB, {k}\n");
                ingest(&*storage, &registry, &report).await.unwrap();
            }
        })
    };

    loop {
        let finished = importer.is_finished();
        let views = all_constituency_views(&*storage).await.unwrap();
        let riverside = views
            .iter()
            .find(|v| v.name == "Riverside")
            .map(|v| v.total_votes)
            .unwrap();
        let seats = views.iter().filter(|v| v.name.starts_with("Seat ")).count() as i64;
        assert_eq!(seats, riverside, "listing mixed two report states");
        if finished {
            break;
        }
        tokio::task::yield_now().await;
    }
    importer.await.unwrap();

    let views = all_constituency_views(&*storage).await.unwrap();
    assert_eq!(views.len(), 26);
    assert_eq!(views.last().unwrap().name, "Seat 25");
}
