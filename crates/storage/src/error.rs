/// All errors that can be returned by a TallyStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A constituency with this name already exists (uniqueness on name).
    #[error("constituency already exists: {name}")]
    ConstituencyExists { name: String },

    /// A result referenced a constituency id that does not exist.
    #[error("unknown constituency id: {constituency_id}")]
    UnknownConstituency { constituency_id: i64 },

    /// A result referenced a party id that does not exist.
    #[error("unknown party id: {party_id}")]
    UnknownParty { party_id: i64 },

    /// The transaction-scoped advisory lock could not be taken.
    #[error("could not acquire lock {lock_id}: {reason}")]
    LockUnavailable { lock_id: i64, reason: String },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
