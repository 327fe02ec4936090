use tally_core::{IngestionSummary, Party, PartyRegistry, MAX_ERROR_DETAILS, MAX_VOTE_COUNT};
use tally_engine::{constituency_view, ingest, national_totals, seed_parties, EngineError};
use tally_storage::{MemoryStorage, TallyStorage};

fn registry() -> PartyRegistry {
    PartyRegistry::new(vec![
        Party::new("LAB", "Labour Party"),
        Party::new("CON", "Conservative Party"),
        Party::new("LD", "Liberal Democrats"),
    ])
    .unwrap()
}

async fn seeded() -> (MemoryStorage, PartyRegistry) {
    let storage = MemoryStorage::new();
    let registry = registry();
    seed_parties(&storage, &registry).await.unwrap();
    (storage, registry)
}

async fn votes_in(storage: &MemoryStorage, constituency: &str) -> Vec<(String, i64)> {
    let mut rows: Vec<(String, i64)> = storage
        .list_results()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.constituency == constituency)
        .map(|r| (r.party_code, r.votes))
        .collect();
    rows.sort();
    rows
}

fn messages(summary: &IngestionSummary) -> Vec<&str> {
    summary.errors.iter().map(|e| e.message.as_str()).collect()
}

#[tokio::test]
async fn riverside_line_upserts_both_parties() {
    let (storage, registry) = seeded().await;
    let summary = ingest(&storage, &registry, "Riverside, LAB, 1200, CON, 900")
        .await
        .unwrap();

    assert_eq!(summary.total_lines, 1);
    assert_eq!(summary.processed_lines, 1);
    assert_eq!(summary.skipped_lines, 0);
    assert_eq!(summary.upserted_results, 2);
    assert!(summary.errors.is_empty());

    let view = constituency_view(&storage, "Riverside")
        .await
        .unwrap()
        .expect("Riverside exists");
    assert_eq!(view.total_votes, 2100);
    assert_eq!(view.winning_party.as_ref().unwrap().party_code, "LAB");
    assert_eq!(view.parties[0].percentage, 57.14);
    assert_eq!(view.parties[1].percentage, 42.86);
}

#[tokio::test]
async fn reversed_pair_order_resolves_identically() {
    let (storage, registry) = seeded().await;
    ingest(&storage, &registry, "Riverside, 1200, LAB, 900, CON")
        .await
        .unwrap();
    assert_eq!(
        votes_in(&storage, "Riverside").await,
        vec![("CON".to_string(), 900), ("LAB".to_string(), 1200)]
    );
}

#[tokio::test]
async fn unknown_party_skips_line_without_creating_constituency() {
    let (storage, registry) = seeded().await;
    let summary = ingest(&storage, &registry, "Oakdale, XYZ, 500").await.unwrap();

    assert_eq!(summary.processed_lines, 0);
    assert_eq!(summary.skipped_lines, 1);
    assert_eq!(
        messages(&summary),
        vec!["Invalid party/vote pair 'XYZ' + '500'", "No valid party/vote pairs found"]
    );
    assert_eq!(summary.errors[0].line_number, 1);
    assert_eq!(summary.errors[0].line, "Oakdale, XYZ, 500");
    assert!(storage.find_constituency("Oakdale").await.unwrap().is_none());
}

#[tokio::test]
async fn reingesting_a_report_is_idempotent() {
    let (storage, registry) = seeded().await;
    let report = "Riverside, LAB, 1200, CON, 900\nOakdale, LD, 300, LAB, 250\n";

    let first = ingest(&storage, &registry, report).await.unwrap();
    let after_first = (
        votes_in(&storage, "Riverside").await,
        votes_in(&storage, "Oakdale").await,
        storage.list_constituencies().await.unwrap().len(),
    );
    let second = ingest(&storage, &registry, report).await.unwrap();
    let after_second = (
        votes_in(&storage, "Riverside").await,
        votes_in(&storage, "Oakdale").await,
        storage.list_constituencies().await.unwrap().len(),
    );

    assert_eq!(first, second);
    assert_eq!(after_first, after_second);
    assert_eq!(storage.list_results().await.unwrap().len(), 4);
}

#[tokio::test]
async fn later_report_overwrites_votes() {
    let (storage, registry) = seeded().await;
    ingest(&storage, &registry, "Riverside, LAB, 1200").await.unwrap();
    ingest(&storage, &registry, "Riverside, LAB, 1300").await.unwrap();
    assert_eq!(
        votes_in(&storage, "Riverside").await,
        vec![("LAB".to_string(), 1300)]
    );
}

#[tokio::test]
async fn processed_lines_count_lines_not_pairs() {
    let (storage, registry) = seeded().await;
    let report = "Riverside, LAB, 1, CON, 2, LD, 3\n\nOakdale, LAB, 4\nNowhere\n";
    let summary = ingest(&storage, &registry, report).await.unwrap();

    assert_eq!(summary.total_lines, 4);
    assert_eq!(summary.processed_lines, 2);
    assert_eq!(summary.skipped_lines, 2);
    assert_eq!(summary.upserted_results, 4);
    assert_eq!(
        messages(&summary),
        vec![
            "Empty line",
            "Expected constituency and at least one party/vote pair"
        ]
    );
    assert_eq!(summary.errors[0].line_number, 2);
    assert_eq!(summary.errors[1].line_number, 4);
}

#[tokio::test]
async fn partially_valid_line_keeps_valid_pairs() {
    let (storage, registry) = seeded().await;
    let summary = ingest(&storage, &registry, "Riverside, LAB, 10, XYZ, 5, CON, -3, LD, 7, CON")
        .await
        .unwrap();

    assert_eq!(summary.processed_lines, 1);
    assert_eq!(summary.upserted_results, 2);
    assert_eq!(
        messages(&summary),
        vec![
            "Trailing token without a matching pair; ignored",
            "Invalid party/vote pair 'XYZ' + '5'",
            "Invalid party/vote pair 'CON' + '-3'",
        ]
    );
    assert_eq!(
        votes_in(&storage, "Riverside").await,
        vec![("LAB".to_string(), 10), ("LD".to_string(), 7)]
    );
}

#[tokio::test]
async fn repeated_party_on_one_line_keeps_last_value() {
    let (storage, registry) = seeded().await;
    let summary = ingest(&storage, &registry, "Riverside, LAB, 10, CON, 4, lab, 12")
        .await
        .unwrap();
    assert_eq!(summary.upserted_results, 2);
    assert_eq!(
        votes_in(&storage, "Riverside").await,
        vec![("CON".to_string(), 4), ("LAB".to_string(), 12)]
    );
}

#[tokio::test]
async fn quoted_and_escaped_names_are_unwrapped() {
    let (storage, registry) = seeded().await;
    let report = "\"Brighton, Pavilion\", LAB, 10\r\nHaltemprice\\, Howden, CON, 20\r\n";
    let summary = ingest(&storage, &registry, report).await.unwrap();

    assert_eq!(summary.processed_lines, 2);
    assert!(storage
        .find_constituency("Brighton, Pavilion")
        .await
        .unwrap()
        .is_some());
    assert!(storage
        .find_constituency("Haltemprice, Howden")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn unterminated_quote_is_a_parse_diagnostic() {
    let (storage, registry) = seeded().await;
    let summary = ingest(&storage, &registry, "\"Riverside, LAB, 10\nOakdale, LAB, 4")
        .await
        .unwrap();
    assert_eq!(summary.skipped_lines, 1);
    assert_eq!(summary.processed_lines, 1);
    assert!(summary.errors[0]
        .message
        .starts_with("Could not parse line:"));
}

#[tokio::test]
async fn byte_order_mark_is_ignored() {
    let (storage, registry) = seeded().await;
    ingest(&storage, &registry, "\u{feff}Riverside, LAB, 10")
        .await
        .unwrap();
    assert!(storage.find_constituency("Riverside").await.unwrap().is_some());
}

#[tokio::test]
async fn blank_report_returns_zero_summary() {
    let (storage, registry) = seeded().await;
    for report in ["", "   ", "\u{feff}\n\r\n  \n"] {
        let summary = ingest(&storage, &registry, report).await.unwrap();
        assert_eq!(summary, IngestionSummary::new());
    }
    assert!(storage.list_constituencies().await.unwrap().is_empty());
}

#[tokio::test]
async fn diagnostics_are_capped() {
    let (storage, registry) = seeded().await;
    let report: String = (0..150).map(|i| format!("Seat{i}, XYZ, 1\n")).collect();
    let summary = ingest(&storage, &registry, &report).await.unwrap();

    assert_eq!(summary.skipped_lines, 150);
    assert_eq!(summary.errors.len(), MAX_ERROR_DETAILS);
    // Two diagnostics per line.
    assert_eq!(summary.diagnostic_count(), 300);
    assert_eq!(summary.errors.last().unwrap().line_number, 50);
}

#[tokio::test]
async fn unseeded_party_aborts_the_whole_report() {
    let storage = MemoryStorage::new();
    seed_parties(
        &storage,
        &PartyRegistry::new(vec![Party::new("LAB", "Labour Party")]).unwrap(),
    )
    .await
    .unwrap();

    let err = ingest(&storage, &registry(), "Riverside, LAB, 10\nOakdale, CON, 5")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnseededParty { ref code } if code == "CON"));

    // Riverside was applied before the failure but must not be committed.
    assert!(storage.list_constituencies().await.unwrap().is_empty());
    assert!(storage.list_results().await.unwrap().is_empty());

    // The import lock was released by the abort.
    ingest(
        &storage,
        &PartyRegistry::new(vec![Party::new("LAB", "Labour Party")]).unwrap(),
        "Riverside, LAB, 10",
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn vote_count_above_cap_is_an_invalid_pair() {
    let (storage, registry) = seeded().await;
    let summary = ingest(
        &storage,
        &registry,
        "Riverside, LAB, 9223372036854775807, CON, 1",
    )
    .await
    .unwrap();

    assert_eq!(summary.processed_lines, 1);
    assert_eq!(summary.upserted_results, 1);
    assert_eq!(
        messages(&summary),
        vec!["Invalid party/vote pair 'LAB' + '9223372036854775807'"]
    );
    let view = constituency_view(&storage, "Riverside").await.unwrap().unwrap();
    assert_eq!(view.total_votes, 1);
    assert_eq!(view.winning_party.unwrap().party_code, "CON");
}

#[tokio::test]
async fn largest_counts_sum_without_overflow() {
    let (storage, registry) = seeded().await;
    let report = format!(
        "A, LAB, {max}, CON, {max}\nB, LAB, {max}\n",
        max = MAX_VOTE_COUNT
    );
    let summary = ingest(&storage, &registry, &report).await.unwrap();
    assert_eq!(summary.upserted_results, 3);

    let view = constituency_view(&storage, "A").await.unwrap().unwrap();
    assert_eq!(view.total_votes, 2 * MAX_VOTE_COUNT);
    assert_eq!(view.parties[0].percentage, 50.0);

    let totals = national_totals(&storage).await.unwrap();
    assert_eq!(totals.overall.total_votes, 3 * MAX_VOTE_COUNT);
    assert_eq!(totals.total_votes_per_party[0].party_code, "LAB");
    assert_eq!(totals.total_votes_per_party[0].votes, 2 * MAX_VOTE_COUNT);
}
