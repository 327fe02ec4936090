//! Atomic ingestion of one results report.
//!
//! The whole report is applied inside a single storage snapshot holding the
//! import lock. Per-line problems become diagnostics in the returned
//! [`IngestionSummary`]; any storage failure aborts the snapshot so a report
//! is either fully applied or not applied at all.

use std::collections::HashMap;

use tally_core::{plan_line, report_lines, strip_bom, IngestionSummary, LinePlan, PartyRegistry};
use tally_storage::TallyStorage;

use crate::error::EngineError;

/// Advisory lock id serializing report imports across every writer.
pub const IMPORT_LOCK_ID: i64 = 205_241;

/// Ingest a results report.
///
/// An empty or all-whitespace report returns an all-zero summary without
/// touching the store.
pub async fn ingest<S: TallyStorage>(
    storage: &S,
    registry: &PartyRegistry,
    report: &str,
) -> Result<IngestionSummary, EngineError> {
    let body = strip_bom(report);
    if body.trim().is_empty() {
        tracing::info!("report contained no data lines");
        return Ok(IngestionSummary::new());
    }

    let mut snapshot = storage.begin_snapshot().await?;
    let summary = match apply_report(storage, &mut snapshot, registry, body).await {
        Ok(summary) => summary,
        Err(e) => {
            let _ = storage.abort_snapshot(snapshot).await;
            tracing::error!(error = %e, "import aborted");
            return Err(e);
        }
    };
    storage.commit_snapshot(snapshot).await?;

    tracing::info!(
        total_lines = summary.total_lines,
        processed_lines = summary.processed_lines,
        skipped_lines = summary.skipped_lines,
        upserted_results = summary.upserted_results,
        diagnostics = summary.diagnostic_count(),
        "import committed"
    );
    Ok(summary)
}

async fn apply_report<S: TallyStorage>(
    storage: &S,
    snapshot: &mut S::Snapshot,
    registry: &PartyRegistry,
    body: &str,
) -> Result<IngestionSummary, EngineError> {
    storage.acquire_import_lock(snapshot, IMPORT_LOCK_ID).await?;

    // Loaded after the lock so they reflect the previous import's commit.
    let party_ids = storage.load_party_ids(snapshot).await?;
    let mut constituency_ids = storage.load_constituency_ids(snapshot).await?;

    let mut summary = IngestionSummary::new();
    for (index, raw) in report_lines(body).enumerate() {
        let line_number = index + 1;
        summary.total_lines += 1;

        let planned = plan_line(registry, raw);
        for message in planned.diagnostics {
            summary.record_error(line_number, raw, message);
        }

        let accepted = match planned.plan {
            LinePlan::Skipped => {
                summary.skipped_lines += 1;
                tracing::debug!(line_number, "line skipped");
                continue;
            }
            LinePlan::Accepted(accepted) => accepted,
        };

        let constituency_id = match constituency_ids.get(&accepted.constituency) {
            Some(id) => *id,
            None => {
                let id = storage
                    .insert_constituency(snapshot, &accepted.constituency)
                    .await?;
                tracing::debug!(line_number, constituency = %accepted.constituency, "constituency created");
                constituency_ids.insert(accepted.constituency.clone(), id);
                id
            }
        };

        for pair in &accepted.votes {
            let party_id = seeded_party_id(&party_ids, &pair.party_code)?;
            storage
                .upsert_result(snapshot, constituency_id, party_id, pair.votes)
                .await?;
            summary.upserted_results += 1;
        }
        summary.processed_lines += 1;
    }

    Ok(summary)
}

fn seeded_party_id(party_ids: &HashMap<String, i64>, code: &str) -> Result<i64, EngineError> {
    party_ids
        .get(code)
        .copied()
        .ok_or_else(|| EngineError::UnseededParty {
            code: code.to_string(),
        })
}
