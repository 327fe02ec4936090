use tally_core::{Party, PartyRegistry};
use tally_engine::{
    all_constituency_views, constituency_view, ingest, national_totals, parties, seed_parties,
};
use tally_storage::{MemoryStorage, TallyStorage};

fn registry() -> PartyRegistry {
    PartyRegistry::new(vec![
        Party::new("LAB", "Labour Party"),
        Party::new("CON", "Conservative Party"),
        Party::new("LD", "Liberal Democrats"),
        Party::new("G", "Green Party"),
    ])
    .unwrap()
}

async fn loaded(report: &str) -> MemoryStorage {
    let storage = MemoryStorage::new();
    let registry = registry();
    seed_parties(&storage, &registry).await.unwrap();
    ingest(&storage, &registry, report).await.unwrap();
    storage
}

const REPORT: &str = "\
Riverside, LAB, 1200, CON, 900
Oakdale, CON, 500, LD, 500
Westfield, LD, 700, LAB, 100, CON, 1
";

#[tokio::test]
async fn unknown_constituency_is_not_found() {
    let storage = loaded(REPORT).await;
    assert!(constituency_view(&storage, "Nowhere").await.unwrap().is_none());
    assert!(constituency_view(&storage, "riverside").await.unwrap().is_none());
}

#[tokio::test]
async fn tied_constituency_goes_to_lowest_code() {
    let storage = loaded(REPORT).await;
    let view = constituency_view(&storage, "Oakdale").await.unwrap().unwrap();
    let winner = view.winning_party.unwrap();
    assert_eq!(winner.party_code, "CON");
    assert_eq!(winner.votes, 500);
    assert_eq!(view.parties[0].percentage, 50.0);
    assert_eq!(view.parties[1].percentage, 50.0);
}

#[tokio::test]
async fn percentages_sum_to_about_one_hundred() {
    let storage = loaded(REPORT).await;
    for view in all_constituency_views(&storage).await.unwrap() {
        let sum: f64 = view.parties.iter().map(|p| p.percentage).sum();
        assert!((sum - 100.0).abs() <= 0.01 * view.parties.len() as f64, "{}: {sum}", view.name);
    }
}

#[tokio::test]
async fn all_views_are_ordered_by_name_and_include_empty_constituencies() {
    let storage = loaded(REPORT).await;

    let mut snap = storage.begin_snapshot().await.unwrap();
    storage.insert_constituency(&mut snap, "Appleby").await.unwrap();
    storage.commit_snapshot(snap).await.unwrap();

    let views = all_constituency_views(&storage).await.unwrap();
    let names: Vec<&str> = views.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["Appleby", "Oakdale", "Riverside", "Westfield"]);

    let empty = &views[0];
    assert_eq!(empty.total_votes, 0);
    assert!(empty.winning_party.is_none());
    assert!(empty.parties.is_empty());
}

#[tokio::test]
async fn national_totals_award_one_seat_per_counted_constituency() {
    let storage = loaded(REPORT).await;

    let mut snap = storage.begin_snapshot().await.unwrap();
    storage.insert_constituency(&mut snap, "Appleby").await.unwrap();
    storage.commit_snapshot(snap).await.unwrap();

    let totals = national_totals(&storage).await.unwrap();
    assert_eq!(totals.overall.total_constituencies, 3);
    assert_eq!(totals.overall.total_votes, 1200 + 900 + 500 + 500 + 700 + 100 + 1);

    let seats: u32 = totals.total_mps_per_party.iter().map(|p| p.seats as u32).sum();
    assert_eq!(seats, 3);

    let votes: Vec<(&str, i64)> = totals
        .total_votes_per_party
        .iter()
        .map(|p| (p.party_code.as_str(), p.votes))
        .collect();
    assert_eq!(votes, [("CON", 1401), ("LAB", 1300), ("LD", 1200), ("G", 0)]);

    let mps: Vec<(&str, usize)> = totals
        .total_mps_per_party
        .iter()
        .map(|p| (p.party_code.as_str(), p.seats))
        .collect();
    assert_eq!(mps, [("CON", 1), ("LAB", 1), ("LD", 1), ("G", 0)]);
}

#[tokio::test]
async fn empty_store_has_zero_totals() {
    let storage = MemoryStorage::new();
    seed_parties(&storage, &registry()).await.unwrap();
    let totals = national_totals(&storage).await.unwrap();
    assert_eq!(totals.overall.total_votes, 0);
    assert_eq!(totals.overall.total_constituencies, 0);
    assert_eq!(totals.total_votes_per_party.len(), 4);
    assert!(totals.total_mps_per_party.iter().all(|p| p.seats == 0));
}

#[tokio::test]
async fn seeding_is_idempotent_and_refreshes_names() {
    let storage = MemoryStorage::new();
    let first = seed_parties(&storage, &registry()).await.unwrap();
    assert_eq!(first.inserted, 4);

    let again = seed_parties(&storage, &registry()).await.unwrap();
    assert_eq!((again.inserted, again.renamed), (0, 0));

    let renamed = PartyRegistry::new(vec![Party::new("LAB", "Labour")]).unwrap();
    let outcome = seed_parties(&storage, &renamed).await.unwrap();
    assert_eq!((outcome.inserted, outcome.renamed), (0, 1));

    let listed = parties(&storage).await.unwrap();
    let codes: Vec<&str> = listed.iter().map(|p| p.code.as_str()).collect();
    assert_eq!(codes, ["CON", "G", "LAB", "LD"]);
    assert_eq!(listed[2].name, "Labour");
}
