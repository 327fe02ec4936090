//! In-process `TallyStorage` backend.
//!
//! Committed state lives behind a `RwLock`. A snapshot carries a private copy
//! of the tables plus the list of writes it staged; commit replays those
//! writes onto the latest committed tables and swaps the result in, so a
//! failing write leaves committed state untouched.
//!
//! The import lock is a per-id `tokio::sync::Mutex` whose owned guard is held
//! by the snapshot. Taking it rebases the snapshot onto the latest committed
//! state. It only serializes writers inside this process; use a database
//! backend when several processes share one store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};

use async_trait::async_trait;
use tally_core::Party;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::StorageError;
use crate::record::{
    ConstituencyRecord, ConstituencyResults, PartyRecord, ResultRecord, SeedOutcome,
};
use crate::traits::TallyStorage;

#[derive(Debug, Clone)]
struct StoredResult {
    votes: i64,
    last_updated: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    parties: BTreeMap<i64, PartyRecord>,
    constituencies: BTreeMap<i64, String>,
    /// Keyed by (constituency_id, party_id): one row per pair.
    results: BTreeMap<(i64, i64), StoredResult>,
}

#[derive(Debug, Clone)]
enum Write {
    Constituency {
        id: i64,
        name: String,
    },
    Result {
        constituency_id: i64,
        party_id: i64,
        votes: i64,
        at: OffsetDateTime,
    },
    Party {
        id: i64,
        code: String,
        name: String,
    },
}

impl Tables {
    fn apply(&mut self, write: &Write) -> Result<(), StorageError> {
        match write {
            Write::Constituency { id, name } => {
                if self.constituencies.values().any(|n| n == name) {
                    return Err(StorageError::ConstituencyExists { name: name.clone() });
                }
                self.constituencies.insert(*id, name.clone());
            }
            Write::Result {
                constituency_id,
                party_id,
                votes,
                at,
            } => {
                if !self.constituencies.contains_key(constituency_id) {
                    return Err(StorageError::UnknownConstituency {
                        constituency_id: *constituency_id,
                    });
                }
                if !self.parties.contains_key(party_id) {
                    return Err(StorageError::UnknownParty {
                        party_id: *party_id,
                    });
                }
                self.results.insert(
                    (*constituency_id, *party_id),
                    StoredResult {
                        votes: *votes,
                        last_updated: *at,
                    },
                );
            }
            Write::Party { id, code, name } => {
                match self.parties.values_mut().find(|p| &p.code == code) {
                    Some(existing) => existing.name = name.clone(),
                    None => {
                        self.parties.insert(
                            *id,
                            PartyRecord {
                                id: *id,
                                code: code.clone(),
                                name: name.clone(),
                            },
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn result_records(&self, only: Option<i64>) -> Result<Vec<ResultRecord>, StorageError> {
        let mut records = Vec::new();
        for ((constituency_id, party_id), stored) in &self.results {
            if only.is_some_and(|id| id != *constituency_id) {
                continue;
            }
            let (Some(constituency), Some(party)) = (
                self.constituencies.get(constituency_id),
                self.parties.get(party_id),
            ) else {
                continue;
            };
            records.push(ResultRecord {
                constituency_id: *constituency_id,
                constituency: constituency.clone(),
                party_id: *party_id,
                party_code: party.code.clone(),
                party_name: party.name.clone(),
                votes: stored.votes,
                last_updated: stored
                    .last_updated
                    .format(&Rfc3339)
                    .map_err(|e| StorageError::Backend(format!("timestamp format: {e}")))?,
            });
        }
        Ok(records)
    }
}

/// An in-progress memory transaction.
pub struct MemorySnapshot {
    tables: Tables,
    writes: Vec<Write>,
    locks: Vec<(i64, OwnedMutexGuard<()>)>,
}

impl MemorySnapshot {
    fn stage(&mut self, write: Write) -> Result<(), StorageError> {
        self.tables.apply(&write)?;
        self.writes.push(write);
        Ok(())
    }
}

/// In-memory storage backend.
#[derive(Default)]
pub struct MemoryStorage {
    committed: RwLock<Tables>,
    next_id: AtomicI64,
    locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn committed(&self) -> RwLockReadGuard<'_, Tables> {
        self.committed.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_handle(&self, lock_id: i64) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(lock_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

#[async_trait]
impl TallyStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        Ok(MemorySnapshot {
            tables: self.committed().clone(),
            writes: Vec::new(),
            locks: Vec::new(),
        })
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        {
            let mut committed = self
                .committed
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let mut next = committed.clone();
            for write in &snapshot.writes {
                next.apply(write)?;
            }
            *committed = next;
        }
        // Locks are released when the snapshot (and its guards) drops here.
        drop(snapshot);
        Ok(())
    }

    async fn abort_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        drop(snapshot);
        Ok(())
    }

    async fn acquire_import_lock(
        &self,
        snapshot: &mut MemorySnapshot,
        lock_id: i64,
    ) -> Result<(), StorageError> {
        if snapshot.locks.iter().any(|(id, _)| *id == lock_id) {
            return Ok(());
        }

        let handle = self.lock_handle(lock_id);
        let guard = handle.lock_owned().await;

        // Rebase onto whatever the previous holder committed.
        let mut tables = self.committed().clone();
        for write in &snapshot.writes {
            tables.apply(write)?;
        }
        snapshot.tables = tables;
        snapshot.locks.push((lock_id, guard));
        tracing::trace!(lock_id, "memory import lock acquired");
        Ok(())
    }

    async fn load_party_ids(
        &self,
        snapshot: &mut MemorySnapshot,
    ) -> Result<HashMap<String, i64>, StorageError> {
        Ok(snapshot
            .tables
            .parties
            .values()
            .map(|p| (p.code.clone(), p.id))
            .collect())
    }

    async fn load_constituency_ids(
        &self,
        snapshot: &mut MemorySnapshot,
    ) -> Result<HashMap<String, i64>, StorageError> {
        Ok(snapshot
            .tables
            .constituencies
            .iter()
            .map(|(id, name)| (name.clone(), *id))
            .collect())
    }

    async fn insert_constituency(
        &self,
        snapshot: &mut MemorySnapshot,
        name: &str,
    ) -> Result<i64, StorageError> {
        let id = self.allocate_id();
        snapshot.stage(Write::Constituency {
            id,
            name: name.to_string(),
        })?;
        Ok(id)
    }

    async fn upsert_result(
        &self,
        snapshot: &mut MemorySnapshot,
        constituency_id: i64,
        party_id: i64,
        votes: i64,
    ) -> Result<(), StorageError> {
        snapshot.stage(Write::Result {
            constituency_id,
            party_id,
            votes,
            at: OffsetDateTime::now_utc(),
        })
    }

    async fn upsert_parties(
        &self,
        snapshot: &mut MemorySnapshot,
        parties: &[Party],
    ) -> Result<SeedOutcome, StorageError> {
        let mut outcome = SeedOutcome::default();
        for party in parties {
            let existing = snapshot
                .tables
                .parties
                .values()
                .find(|p| p.code == party.code)
                .map(|p| p.name.clone());
            match existing {
                Some(name) if name == party.name => continue,
                Some(_) => outcome.renamed += 1,
                None => outcome.inserted += 1,
            }
            let id = self.allocate_id();
            snapshot.stage(Write::Party {
                id,
                code: party.code.clone(),
                name: party.name.clone(),
            })?;
        }
        Ok(outcome)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn list_parties(&self) -> Result<Vec<PartyRecord>, StorageError> {
        let mut parties: Vec<PartyRecord> = self.committed().parties.values().cloned().collect();
        parties.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(parties)
    }

    async fn list_constituencies(&self) -> Result<Vec<ConstituencyRecord>, StorageError> {
        let mut constituencies: Vec<ConstituencyRecord> = self
            .committed()
            .constituencies
            .iter()
            .map(|(id, name)| ConstituencyRecord {
                id: *id,
                name: name.clone(),
            })
            .collect();
        constituencies.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(constituencies)
    }

    async fn find_constituency(
        &self,
        name: &str,
    ) -> Result<Option<ConstituencyRecord>, StorageError> {
        Ok(self
            .committed()
            .constituencies
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, n)| ConstituencyRecord {
                id: *id,
                name: n.clone(),
            }))
    }

    async fn results_for_constituency(
        &self,
        constituency_id: i64,
    ) -> Result<Vec<ResultRecord>, StorageError> {
        self.committed().result_records(Some(constituency_id))
    }

    async fn list_results(&self) -> Result<Vec<ResultRecord>, StorageError> {
        self.committed().result_records(None)
    }

    async fn constituency_results(&self) -> Result<Vec<ConstituencyResults>, StorageError> {
        let tables = self.committed();
        let mut grouped: Vec<ConstituencyResults> = tables
            .constituencies
            .iter()
            .map(|(id, name)| ConstituencyResults {
                constituency: ConstituencyRecord {
                    id: *id,
                    name: name.clone(),
                },
                results: Vec::new(),
            })
            .collect();
        grouped.sort_by(|a, b| a.constituency.name.cmp(&b.constituency.name));

        let position: HashMap<i64, usize> = grouped
            .iter()
            .enumerate()
            .map(|(idx, g)| (g.constituency.id, idx))
            .collect();
        for record in tables.result_records(None)? {
            if let Some(idx) = position.get(&record.constituency_id) {
                grouped[*idx].results.push(record);
            }
        }
        Ok(grouped)
    }
}
