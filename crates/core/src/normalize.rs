//! Vote count parsing.

/// Largest vote count accepted for one party in one constituency.
///
/// Keeps every per-constituency and national sum well inside `i64`.
pub const MAX_VOTE_COUNT: i64 = 1_000_000_000;

/// Outcome of interpreting a token as a vote count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteCount {
    /// The token was empty after trimming.
    Absent,
    /// Not an integer, negative, or above [`MAX_VOTE_COUNT`].
    Invalid,
    Count(i64),
}

impl VoteCount {
    pub fn count(self) -> Option<i64> {
        match self {
            VoteCount::Count(n) => Some(n),
            VoteCount::Absent | VoteCount::Invalid => None,
        }
    }
}

/// Interpret a raw token as a non-negative vote count.
pub fn parse_vote_count(token: &str) -> VoteCount {
    let value = token.trim();
    if value.is_empty() {
        return VoteCount::Absent;
    }
    match value.parse::<i64>() {
        Ok(n) if (0..=MAX_VOTE_COUNT).contains(&n) => VoteCount::Count(n),
        _ => VoteCount::Invalid,
    }
}
