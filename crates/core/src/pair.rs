//! Order-agnostic resolution of a (party, votes) token pair.

use crate::normalize::parse_vote_count;
use crate::registry::PartyRegistry;

/// A party code paired with its vote count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPair {
    pub party_code: String,
    pub votes: i64,
}

/// Resolve two adjacent tokens into a party code and a vote count.
///
/// The reading (first = party, second = votes) is tried before
/// (second = party, first = votes), so it wins when both would validate.
/// Returns `None` when neither reading is valid.
pub fn resolve_pair(registry: &PartyRegistry, first: &str, second: &str) -> Option<ResolvedPair> {
    if let (Some(code), Some(votes)) = (
        registry.normalize_party_code(first),
        parse_vote_count(second).count(),
    ) {
        return Some(ResolvedPair {
            party_code: code.to_string(),
            votes,
        });
    }

    if let (Some(code), Some(votes)) = (
        registry.normalize_party_code(second),
        parse_vote_count(first).count(),
    ) {
        return Some(ResolvedPair {
            party_code: code.to_string(),
            votes,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Party;

    fn registry() -> PartyRegistry {
        PartyRegistry::new(vec![
            Party::new("LAB", "Labour"),
            Party::new("CON", "Conservative"),
            Party::new("7", "Seven Party"),
            Party::new("9", "Nine Party"),
        ])
        .unwrap()
    }

    fn pair(code: &str, votes: i64) -> Option<ResolvedPair> {
        Some(ResolvedPair {
            party_code: code.to_string(),
            votes,
        })
    }

    #[test]
    fn party_then_votes() {
        assert_eq!(resolve_pair(&registry(), "LAB", "1200"), pair("LAB", 1200));
    }

    #[test]
    fn votes_then_party() {
        assert_eq!(resolve_pair(&registry(), "1200", "LAB"), pair("LAB", 1200));
    }

    #[test]
    fn case_is_normalized() {
        assert_eq!(resolve_pair(&registry(), "con", "900"), pair("CON", 900));
        assert_eq!(resolve_pair(&registry(), " 900 ", " Con "), pair("CON", 900));
    }

    #[test]
    fn first_position_wins_when_both_orders_validate() {
        assert_eq!(resolve_pair(&registry(), "7", "9"), pair("7", 9));
        assert_eq!(resolve_pair(&registry(), "9", "7"), pair("9", 7));
    }

    #[test]
    fn unresolved_pairs() {
        let reg = registry();
        assert_eq!(resolve_pair(&reg, "XYZ", "500"), None);
        assert_eq!(resolve_pair(&reg, "LAB", "CON"), None);
        assert_eq!(resolve_pair(&reg, "100", "200"), None);
        assert_eq!(resolve_pair(&reg, "LAB", "-3"), None);
        assert_eq!(resolve_pair(&reg, "LAB", ""), None);
    }
}
