//! Read-side aggregation: constituency breakdowns and national totals.
//!
//! Everything here is pure: callers fetch committed rows from storage and
//! hand them in. Ordering is always votes (or seats) descending with the
//! party code ascending as the tie-break, so a tie is never decided by
//! row order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::registry::Party;

/// Votes for one party in one constituency, as read from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyVotes {
    pub party_code: String,
    pub party_name: String,
    pub votes: i64,
}

/// One result row tagged with its constituency, used for national totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalliedResult {
    pub constituency: String,
    pub party_code: String,
    pub votes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyShare {
    pub party_code: String,
    pub party_name: String,
    pub votes: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinningParty {
    pub party_code: String,
    pub party_name: String,
    pub votes: i64,
}

/// Per-constituency breakdown with a winner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstituencyView {
    pub name: String,
    pub total_votes: i64,
    pub winning_party: Option<WinningParty>,
    pub parties: Vec<PartyShare>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyVoteTotal {
    pub party_code: String,
    pub party_name: String,
    pub votes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySeatTotal {
    pub party_code: String,
    pub party_name: String,
    pub seats: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallTotals {
    pub total_votes: i64,
    /// Constituencies with at least one reported result.
    pub total_constituencies: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NationalTotals {
    pub total_votes_per_party: Vec<PartyVoteTotal>,
    pub total_mps_per_party: Vec<PartySeatTotal>,
    pub overall: OverallTotals,
}

/// Standings order: higher count first, then ascending party code.
fn standing_order(a_count: i64, a_code: &str, b_count: i64, b_code: &str) -> Ordering {
    b_count.cmp(&a_count).then_with(|| a_code.cmp(b_code))
}

/// Vote share as a percentage rounded to two decimal places.
///
/// The quotient is computed exactly in decimal and rounded half-to-even, so
/// an exact midpoint such as 23/160 = 14.375% becomes 14.38 even where a
/// binary-float `round` would land on 14.37. Returns `0.0` when `total` is
/// zero.
pub fn vote_share(votes: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let share = Decimal::from(votes) * Decimal::ONE_HUNDRED / Decimal::from(total);
    share
        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
        .to_f64()
        .unwrap_or(0.0)
}

/// Build the breakdown for one constituency from its result rows.
///
/// The total saturates at `i64::MAX` rather than overflowing.
pub fn constituency_view(name: &str, rows: Vec<PartyVotes>) -> ConstituencyView {
    let mut rows = rows;
    rows.sort_by(|a, b| standing_order(a.votes, &a.party_code, b.votes, &b.party_code));

    let total_votes = rows.iter().fold(0i64, |acc, r| acc.saturating_add(r.votes));

    let winning_party = rows.first().map(|leader| WinningParty {
        party_code: leader.party_code.clone(),
        party_name: leader.party_name.clone(),
        votes: leader.votes,
    });

    let parties = rows
        .into_iter()
        .map(|r| PartyShare {
            percentage: vote_share(r.votes, total_votes),
            party_code: r.party_code,
            party_name: r.party_name,
            votes: r.votes,
        })
        .collect();

    ConstituencyView {
        name: name.to_string(),
        total_votes,
        winning_party,
        parties,
    }
}

/// Winner per constituency, keyed by constituency name.
///
/// Constituencies without any rows do not appear.
pub fn constituency_winners(results: &[TalliedResult]) -> BTreeMap<&str, &TalliedResult> {
    let mut winners: BTreeMap<&str, &TalliedResult> = BTreeMap::new();
    for row in results {
        let replace = match winners.get(row.constituency.as_str()) {
            None => true,
            Some(current) => {
                standing_order(row.votes, &row.party_code, current.votes, &current.party_code)
                    == Ordering::Less
            }
        };
        if replace {
            winners.insert(row.constituency.as_str(), row);
        }
    }
    winners
}

/// National vote and seat totals for every registered party.
///
/// Every party in `parties` appears in both lists, with zero when it has no
/// votes or seats. Each constituency with at least one result awards one
/// seat to its winner. Sums saturate at `i64::MAX`.
pub fn national_totals(parties: &[Party], results: &[TalliedResult]) -> NationalTotals {
    let mut votes_by_code: HashMap<&str, i64> = parties.iter().map(|p| (p.code.as_str(), 0)).collect();
    for row in results {
        if let Some(total) = votes_by_code.get_mut(row.party_code.as_str()) {
            *total = total.saturating_add(row.votes);
        }
    }

    let winners = constituency_winners(results);
    let mut seats_by_code: HashMap<&str, usize> = HashMap::new();
    for winner in winners.values() {
        *seats_by_code.entry(winner.party_code.as_str()).or_default() += 1;
    }

    let mut total_votes_per_party: Vec<PartyVoteTotal> = parties
        .iter()
        .map(|p| PartyVoteTotal {
            party_code: p.code.clone(),
            party_name: p.name.clone(),
            votes: votes_by_code.get(p.code.as_str()).copied().unwrap_or(0),
        })
        .collect();
    total_votes_per_party
        .sort_by(|a, b| standing_order(a.votes, &a.party_code, b.votes, &b.party_code));

    let mut total_mps_per_party: Vec<PartySeatTotal> = parties
        .iter()
        .map(|p| PartySeatTotal {
            party_code: p.code.clone(),
            party_name: p.name.clone(),
            seats: seats_by_code.get(p.code.as_str()).copied().unwrap_or(0),
        })
        .collect();
    total_mps_per_party.sort_by(|a, b| {
        standing_order(a.seats as i64, &a.party_code, b.seats as i64, &b.party_code)
    });

    NationalTotals {
        overall: OverallTotals {
            total_votes: votes_by_code
                .values()
                .fold(0i64, |acc, v| acc.saturating_add(*v)),
            total_constituencies: winners.len(),
        },
        total_votes_per_party,
        total_mps_per_party,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pv(code: &str, votes: i64) -> PartyVotes {
        PartyVotes {
            party_code: code.to_string(),
            party_name: format!("{code} Party"),
            votes,
        }
    }

    fn tr(constituency: &str, code: &str, votes: i64) -> TalliedResult {
        TalliedResult {
            constituency: constituency.to_string(),
            party_code: code.to_string(),
            votes,
        }
    }

    fn parties(codes: &[&str]) -> Vec<Party> {
        codes
            .iter()
            .map(|c| Party::new(*c, format!("{c} Party")))
            .collect()
    }

    #[test]
    fn riverside_breakdown() {
        let view = constituency_view("Riverside", vec![pv("CON", 900), pv("LAB", 1200)]);
        assert_eq!(view.total_votes, 2100);
        assert_eq!(view.winning_party.as_ref().unwrap().party_code, "LAB");
        assert_eq!(view.parties[0].party_code, "LAB");
        assert_eq!(view.parties[0].percentage, 57.14);
        assert_eq!(view.parties[1].percentage, 42.86);
    }

    #[test]
    fn percentages_sum_to_one_hundred() {
        let view = constituency_view("X", vec![pv("A", 1), pv("B", 1), pv("C", 1)]);
        let sum: f64 = view.parties.iter().map(|p| p.percentage).sum();
        assert!((sum - 100.0).abs() <= 0.02, "sum was {sum}");
    }

    #[test]
    fn zero_total_gives_zero_percentages_and_a_winner() {
        let view = constituency_view("X", vec![pv("B", 0), pv("A", 0)]);
        assert_eq!(view.total_votes, 0);
        assert!(view.parties.iter().all(|p| p.percentage == 0.0));
        assert_eq!(view.winning_party.unwrap().party_code, "A");
    }

    #[test]
    fn no_rows_means_no_winner() {
        let view = constituency_view("Empty", vec![]);
        assert_eq!(view.total_votes, 0);
        assert!(view.winning_party.is_none());
        assert!(view.parties.is_empty());
    }

    #[test]
    fn tie_goes_to_smaller_party_code() {
        let view = constituency_view("Tied", vec![pv("LAB", 500), pv("CON", 500)]);
        assert_eq!(view.winning_party.unwrap().party_code, "CON");
        assert_eq!(view.parties[0].percentage, 50.0);
    }

    #[test]
    fn vote_share_rounds_half_to_even() {
        // 1/8 = 12.5% exactly; 1/800 = 0.125% exactly
        assert_eq!(vote_share(1, 8), 12.5);
        assert_eq!(vote_share(1, 800), 0.12);
        assert_eq!(vote_share(3, 800), 0.38);
        assert_eq!(vote_share(5, 0), 0.0);
    }

    #[test]
    fn vote_share_rounds_exact_midpoints_not_float_approximations() {
        // 14.375 and 30.625 are exact; float division lands just either side
        assert_eq!(vote_share(23, 160), 14.38);
        assert_eq!(vote_share(49, 160), 30.62);
    }

    #[test]
    fn national_totals_count_votes_and_seats() {
        let results = vec![
            tr("Riverside", "LAB", 1200),
            tr("Riverside", "CON", 900),
            tr("Oakdale", "CON", 700),
            tr("Oakdale", "LD", 300),
            tr("Hillside", "LD", 400),
            tr("Hillside", "LAB", 400),
        ];
        let totals = national_totals(&parties(&["CON", "LAB", "LD", "G"]), &results);

        let votes: Vec<(&str, i64)> = totals
            .total_votes_per_party
            .iter()
            .map(|t| (t.party_code.as_str(), t.votes))
            .collect();
        assert_eq!(votes, vec![("CON", 1600), ("LAB", 1600), ("LD", 700), ("G", 0)]);

        let seats: Vec<(&str, usize)> = totals
            .total_mps_per_party
            .iter()
            .map(|t| (t.party_code.as_str(), t.seats))
            .collect();
        // Hillside is a tie between LAB and LD; LAB sorts first
        assert_eq!(seats, vec![("LAB", 2), ("CON", 1), ("G", 0), ("LD", 0)]);

        assert_eq!(totals.overall.total_votes, 3900);
        assert_eq!(totals.overall.total_constituencies, 3);
        let seat_sum: usize = totals.total_mps_per_party.iter().map(|t| t.seats).sum();
        assert_eq!(seat_sum, totals.overall.total_constituencies);
    }

    #[test]
    fn oversized_rows_do_not_overflow() {
        let view = constituency_view("Big", vec![pv("A", i64::MAX), pv("B", 1)]);
        assert_eq!(view.total_votes, i64::MAX);
        assert_eq!(view.winning_party.unwrap().party_code, "A");

        let results = vec![tr("X", "A", i64::MAX), tr("Y", "A", 1), tr("Y", "B", 5)];
        let totals = national_totals(&parties(&["A", "B"]), &results);
        assert_eq!(totals.total_votes_per_party[0].votes, i64::MAX);
        assert_eq!(totals.overall.total_votes, i64::MAX);
        assert_eq!(totals.overall.total_constituencies, 2);
    }

    #[test]
    fn national_totals_with_no_results() {
        let totals = national_totals(&parties(&["LAB", "CON"]), &[]);
        assert_eq!(totals.overall.total_votes, 0);
        assert_eq!(totals.overall.total_constituencies, 0);
        assert_eq!(totals.total_votes_per_party[0].party_code, "CON");
        assert!(totals.total_mps_per_party.iter().all(|t| t.seats == 0));
    }

    #[test]
    fn winners_ignore_row_order() {
        let a = vec![tr("X", "B", 10), tr("X", "A", 10)];
        let b = vec![tr("X", "A", 10), tr("X", "B", 10)];
        assert_eq!(constituency_winners(&a)["X"].party_code, "A");
        assert_eq!(constituency_winners(&b)["X"].party_code, "A");
    }
}
