//! Read-side views over committed results.

use tally_core::tally;
use tally_core::{ConstituencyView, NationalTotals, Party, PartyVotes, TalliedResult};
use tally_storage::{PartyRecord, ResultRecord, TallyStorage};

use crate::error::EngineError;

fn party_votes(record: ResultRecord) -> PartyVotes {
    PartyVotes {
        party_code: record.party_code,
        party_name: record.party_name,
        votes: record.votes,
    }
}

/// Breakdown for one constituency, or `None` when the exact name is unknown.
pub async fn constituency_view<S: TallyStorage>(
    storage: &S,
    name: &str,
) -> Result<Option<ConstituencyView>, EngineError> {
    let Some(constituency) = storage.find_constituency(name).await? else {
        return Ok(None);
    };
    let rows = storage
        .results_for_constituency(constituency.id)
        .await?
        .into_iter()
        .map(party_votes)
        .collect();
    Ok(Some(tally::constituency_view(&constituency.name, rows)))
}

/// Breakdown for every constituency, ordered by name.
///
/// Constituencies with no results appear with zero votes and no winner.
pub async fn all_constituency_views<S: TallyStorage>(
    storage: &S,
) -> Result<Vec<ConstituencyView>, EngineError> {
    Ok(storage
        .constituency_results()
        .await?
        .into_iter()
        .map(|group| {
            let rows = group.results.into_iter().map(party_votes).collect();
            tally::constituency_view(&group.constituency.name, rows)
        })
        .collect())
}

/// National vote and seat totals for every seeded party.
pub async fn national_totals<S: TallyStorage>(storage: &S) -> Result<NationalTotals, EngineError> {
    let parties: Vec<Party> = storage
        .list_parties()
        .await?
        .into_iter()
        .map(|p| Party::new(p.code, p.name))
        .collect();
    let results: Vec<TalliedResult> = storage
        .list_results()
        .await?
        .into_iter()
        .map(|r| TalliedResult {
            constituency: r.constituency,
            party_code: r.party_code,
            votes: r.votes,
        })
        .collect();
    Ok(tally::national_totals(&parties, &results))
}

/// The seeded party list, ordered by code.
pub async fn parties<S: TallyStorage>(storage: &S) -> Result<Vec<PartyRecord>, EngineError> {
    Ok(storage.list_parties().await?)
}
