//! Planning of a single report line.
//!
//! [`plan_line`] turns one raw line into either a skip decision or an
//! accepted constituency with its deduplicated party votes, together with
//! every soft diagnostic the line raised. It performs no I/O; applying an
//! accepted line to storage is the ingestion engine's job.

use crate::line::tokenize_line;
use crate::pair::{resolve_pair, ResolvedPair};
use crate::registry::PartyRegistry;

pub const MSG_EMPTY_LINE: &str = "Empty line";
pub const MSG_INSUFFICIENT_TOKENS: &str = "Expected constituency and at least one party/vote pair";
pub const MSG_MISSING_CONSTITUENCY: &str = "Missing constituency name";
pub const MSG_TRAILING_TOKEN: &str = "Trailing token without a matching pair; ignored";
pub const MSG_NO_VALID_PAIRS: &str = "No valid party/vote pairs found";

/// A line that yielded at least one valid pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedLine {
    pub constituency: String,
    /// One entry per party code, in order of first appearance.
    pub votes: Vec<ResolvedPair>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinePlan {
    Skipped,
    Accepted(AcceptedLine),
}

/// The decision for one line plus the diagnostics it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    pub plan: LinePlan,
    pub diagnostics: Vec<String>,
}

impl PlannedLine {
    fn skipped(diagnostics: Vec<String>) -> Self {
        PlannedLine {
            plan: LinePlan::Skipped,
            diagnostics,
        }
    }
}

/// Decide what to do with one raw report line.
pub fn plan_line(registry: &PartyRegistry, raw_line: &str) -> PlannedLine {
    if raw_line.trim().is_empty() {
        return PlannedLine::skipped(vec![MSG_EMPTY_LINE.to_string()]);
    }

    let tokens = match tokenize_line(raw_line) {
        Ok(tokens) => tokens,
        Err(e) => return PlannedLine::skipped(vec![format!("Could not parse line: {e}")]),
    };

    if tokens.len() < 3 {
        return PlannedLine::skipped(vec![MSG_INSUFFICIENT_TOKENS.to_string()]);
    }

    let constituency = tokens[0].trim();
    if constituency.is_empty() {
        return PlannedLine::skipped(vec![MSG_MISSING_CONSTITUENCY.to_string()]);
    }

    let mut diagnostics = Vec::new();
    let payload = &tokens[1..];
    if payload.len() % 2 != 0 {
        diagnostics.push(MSG_TRAILING_TOKEN.to_string());
    }

    let mut votes: Vec<ResolvedPair> = Vec::new();
    for chunk in payload.chunks_exact(2) {
        let (first, second) = (&chunk[0], &chunk[1]);
        match resolve_pair(registry, first, second) {
            Some(pair) => match votes.iter_mut().find(|v| v.party_code == pair.party_code) {
                // Last occurrence of a party on one line wins
                Some(existing) => existing.votes = pair.votes,
                None => votes.push(pair),
            },
            None => {
                diagnostics.push(format!("Invalid party/vote pair '{first}' + '{second}'"));
            }
        }
    }

    if votes.is_empty() {
        diagnostics.push(MSG_NO_VALID_PAIRS.to_string());
        return PlannedLine::skipped(diagnostics);
    }

    PlannedLine {
        plan: LinePlan::Accepted(AcceptedLine {
            constituency: constituency.to_string(),
            votes,
        }),
        diagnostics,
    }
}
