use serde::{Deserialize, Serialize};

/// A seeded party row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRecord {
    pub id: i64,
    pub code: String,
    pub name: String,
}

/// A constituency row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstituencyRecord {
    pub id: i64,
    pub name: String,
}

/// A result row joined with its constituency and party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub constituency_id: i64,
    pub constituency: String,
    pub party_id: i64,
    pub party_code: String,
    pub party_name: String,
    pub votes: i64,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub last_updated: String,
}

/// A constituency together with all of its result rows, read as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstituencyResults {
    pub constituency: ConstituencyRecord,
    pub results: Vec<ResultRecord>,
}

/// Outcome of seeding the party table from a registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedOutcome {
    /// Parties that did not exist before.
    pub inserted: usize,
    /// Existing parties whose display name changed.
    pub renamed: usize,
}
