use tally_storage::StorageError;

/// Hard failures of an engine operation.
///
/// Any of these aborts the enclosing snapshot; nothing is committed.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The registry names a party the store was never seeded with.
    #[error("party '{code}' is in the registry but has not been seeded")]
    UnseededParty { code: String },
}
