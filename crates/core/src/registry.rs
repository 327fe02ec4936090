//! The fixed party registry.
//!
//! The registry is the single source of truth for which party codes a report
//! may mention. It is built once at startup and never mutated; lookups are
//! answered from an index built at construction time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// One registered party: canonical code plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub code: String,
    pub name: String,
}

impl Party {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Party {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Parties known to the default registry, in registry order.
const DEFAULT_PARTIES: &[(&str, &str)] = &[
    ("C", "Conservative Party"),
    ("L", "Labour Party"),
    ("UKIP", "UKIP"),
    ("LD", "Liberal Democrats"),
    ("G", "Green Party"),
    ("Ind", "Independent"),
    ("SNP", "SNP"),
];

/// Immutable, ordered mapping from canonical party code to display name.
#[derive(Debug, Clone)]
pub struct PartyRegistry {
    parties: Vec<Party>,
    /// code -> index into `parties`
    by_code: HashMap<String, usize>,
}

impl PartyRegistry {
    /// Build a registry from an ordered list of parties.
    ///
    /// Codes are trimmed. Empty codes and exact duplicates are rejected.
    pub fn new(parties: Vec<Party>) -> Result<Self, RegistryError> {
        if parties.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut normalized = Vec::with_capacity(parties.len());
        let mut by_code = HashMap::with_capacity(parties.len());
        for (index, party) in parties.into_iter().enumerate() {
            let code = party.code.trim().to_string();
            if code.is_empty() {
                return Err(RegistryError::EmptyCode { index });
            }
            if by_code.insert(code.clone(), index).is_some() {
                return Err(RegistryError::DuplicateCode { code });
            }
            normalized.push(Party {
                code,
                name: party.name.trim().to_string(),
            });
        }

        Ok(PartyRegistry {
            parties: normalized,
            by_code,
        })
    }

    /// Map a raw token to its canonical party code.
    ///
    /// An exact match wins; otherwise the first entry (in registry order)
    /// whose code matches case-insensitively is returned.
    pub fn normalize_party_code(&self, token: &str) -> Option<&str> {
        let candidate = token.trim();
        if let Some(&idx) = self.by_code.get(candidate) {
            return Some(&self.parties[idx].code);
        }

        let lowered = candidate.to_lowercase();
        self.parties
            .iter()
            .find(|p| p.code.to_lowercase() == lowered)
            .map(|p| p.code.as_str())
    }

    /// Parties in registry order.
    pub fn parties(&self) -> &[Party] {
        &self.parties
    }

    pub fn len(&self) -> usize {
        self.parties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }
}

impl Default for PartyRegistry {
    fn default() -> Self {
        let parties = DEFAULT_PARTIES
            .iter()
            .map(|(code, name)| Party::new(*code, *name))
            .collect::<Vec<_>>();
        let by_code = parties
            .iter()
            .enumerate()
            .map(|(idx, p)| (p.code.clone(), idx))
            .collect();
        PartyRegistry { parties, by_code }
    }
}
