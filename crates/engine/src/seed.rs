use tally_core::PartyRegistry;
use tally_storage::{SeedOutcome, TallyStorage};

use crate::error::EngineError;

/// Make the store's party table match the registry.
///
/// Missing parties are inserted and changed display names refreshed, in one
/// snapshot. Parties absent from the registry are kept.
pub async fn seed_parties<S: TallyStorage>(
    storage: &S,
    registry: &PartyRegistry,
) -> Result<SeedOutcome, EngineError> {
    let mut snapshot = storage.begin_snapshot().await?;
    let outcome = match storage.upsert_parties(&mut snapshot, registry.parties()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let _ = storage.abort_snapshot(snapshot).await;
            return Err(e.into());
        }
    };
    storage.commit_snapshot(snapshot).await?;

    tracing::info!(
        parties = registry.len(),
        inserted = outcome.inserted,
        renamed = outcome.renamed,
        "party registry seeded"
    );
    Ok(outcome)
}
