use std::collections::HashMap;

use async_trait::async_trait;
use tally_core::Party;

use crate::error::StorageError;
use crate::record::{
    ConstituencyRecord, ConstituencyResults, PartyRecord, ResultRecord, SeedOutcome,
};

/// The storage trait for tally backends.
///
/// A `TallyStorage` implementation provides transactional storage for
/// parties, constituencies and per-(constituency, party) results.
///
/// ## Snapshot Semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing an
/// in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()` — start a transaction, returns a `Snapshot`
/// 2. Optionally `acquire_import_lock(&mut snapshot, id)` to serialize
///    against other writers holding the same lock id
/// 3. Call mutating methods with `&mut snapshot`
/// 4. `commit_snapshot(snapshot)` — commit and consume the transaction
///    OR `abort_snapshot(snapshot)` — roll back and consume the transaction
///
/// If a `Snapshot` is dropped without committing, the underlying transaction
/// MUST be rolled back and any lock it holds released.
///
/// ## Import Lock
///
/// `acquire_import_lock` blocks until no other snapshot holds the same lock
/// id. The lock lives exactly as long as the snapshot. Reads issued through
/// the snapshot after the lock is granted observe every write committed by
/// the previous holder.
///
/// ## Uniqueness
///
/// At most one result exists per (constituency, party) pair and at most one
/// constituency per name. Backends enforce both as constraints, not by
/// convention.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait TallyStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    ///
    /// Must be `Send` to allow passing across async task boundaries.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all mutations durable and releasing its lock.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all mutations.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Take the named, transaction-scoped advisory lock.
    ///
    /// Re-acquiring a lock the snapshot already holds returns immediately.
    async fn acquire_import_lock(
        &self,
        snapshot: &mut Self::Snapshot,
        lock_id: i64,
    ) -> Result<(), StorageError>;

    // ── Reads and writes within a snapshot ────────────────────────────────────

    /// Party code → party id for every seeded party.
    async fn load_party_ids(
        &self,
        snapshot: &mut Self::Snapshot,
    ) -> Result<HashMap<String, i64>, StorageError>;

    /// Constituency name → constituency id for every constituency.
    async fn load_constituency_ids(
        &self,
        snapshot: &mut Self::Snapshot,
    ) -> Result<HashMap<String, i64>, StorageError>;

    /// Create a constituency and return its id.
    ///
    /// Returns `Err(StorageError::ConstituencyExists)` if the name is taken.
    async fn insert_constituency(
        &self,
        snapshot: &mut Self::Snapshot,
        name: &str,
    ) -> Result<i64, StorageError>;

    /// Insert the result for (constituency, party), or overwrite its votes
    /// and refresh its timestamp if it already exists.
    async fn upsert_result(
        &self,
        snapshot: &mut Self::Snapshot,
        constituency_id: i64,
        party_id: i64,
        votes: i64,
    ) -> Result<(), StorageError>;

    /// Insert missing parties and refresh changed display names.
    ///
    /// Parties absent from `parties` are left untouched.
    async fn upsert_parties(
        &self,
        snapshot: &mut Self::Snapshot,
        parties: &[Party],
    ) -> Result<SeedOutcome, StorageError>;

    // ── Query operations (outside snapshot, committed state only) ─────────────

    /// Cheap connectivity check.
    async fn ping(&self) -> Result<(), StorageError>;

    /// All parties ordered by code.
    async fn list_parties(&self) -> Result<Vec<PartyRecord>, StorageError>;

    /// All constituencies ordered by name.
    async fn list_constituencies(&self) -> Result<Vec<ConstituencyRecord>, StorageError>;

    /// Look up a constituency by exact (case-sensitive) name.
    async fn find_constituency(
        &self,
        name: &str,
    ) -> Result<Option<ConstituencyRecord>, StorageError>;

    /// Results for one constituency, in no particular order.
    async fn results_for_constituency(
        &self,
        constituency_id: i64,
    ) -> Result<Vec<ResultRecord>, StorageError>;

    /// Every result row, in no particular order.
    async fn list_results(&self) -> Result<Vec<ResultRecord>, StorageError>;

    /// Every constituency ordered by name, each with its result rows.
    ///
    /// Constituencies without results carry an empty list. The whole listing
    /// comes from a single read of committed state, so it reflects either all
    /// or none of any concurrently committing snapshot.
    async fn constituency_results(&self) -> Result<Vec<ConstituencyResults>, StorageError>;
}
