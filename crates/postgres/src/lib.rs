//! tally-postgres: PostgreSQL implementation of `TallyStorage`.
//!
//! A snapshot is a sqlx transaction running at READ COMMITTED, so statements
//! issued after `pg_advisory_xact_lock` returns see everything the previous
//! lock holder committed. Dropping a snapshot rolls the transaction back and
//! releases the advisory lock with it.

mod schema;

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tally_core::Party;
use tally_storage::{
    ConstituencyRecord, ConstituencyResults, PartyRecord, ResultRecord, SeedOutcome,
    StorageError, TallyStorage,
};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub use schema::{init_schema, reset, SCHEMA};

const MAX_CONNECTIONS: u32 = 10;

const RESULT_COLUMNS: &str = "SELECT r.constituency_id, c.name, r.party_id, p.code, p.name, \
     r.votes, r.last_updated \
     FROM results r \
     JOIN constituencies c ON c.id = r.constituency_id \
     JOIN parties p ON p.id = r.party_id";

type ResultRow = (i64, String, i64, String, String, i64, OffsetDateTime);

/// Every constituency with its results, in one statement. Result columns are
/// NULL for constituencies without results.
const CONSTITUENCY_RESULTS: &str = "SELECT c.id, c.name, r.party_id, p.code, p.name, \
     r.votes, r.last_updated \
     FROM constituencies c \
     LEFT JOIN results r ON r.constituency_id = c.id \
     LEFT JOIN parties p ON p.id = r.party_id \
     ORDER BY c.name COLLATE \"C\", c.id";

type ConstituencyResultRow = (
    i64,
    String,
    Option<i64>,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<OffsetDateTime>,
);

pub(crate) fn backend_error(e: sqlx::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn result_record(row: ResultRow) -> Result<ResultRecord, StorageError> {
    let (constituency_id, constituency, party_id, party_code, party_name, votes, at) = row;
    Ok(ResultRecord {
        constituency_id,
        constituency,
        party_id,
        party_code,
        party_name,
        votes,
        last_updated: at
            .format(&Rfc3339)
            .map_err(|e| StorageError::Backend(format!("timestamp format: {e}")))?,
    })
}

/// An open transaction plus the advisory locks it holds.
pub struct PostgresSnapshot {
    tx: Transaction<'static, Postgres>,
    locks: Vec<i64>,
}

/// PostgreSQL-backed storage.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool for `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(backend_error)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and constraints if they do not exist yet.
    pub async fn init_schema(&self) -> Result<(), StorageError> {
        schema::init_schema(&self.pool).await
    }
}

#[async_trait]
impl TallyStorage for PostgresStorage {
    type Snapshot = PostgresSnapshot;

    async fn begin_snapshot(&self) -> Result<PostgresSnapshot, StorageError> {
        let mut tx = self.pool.begin().await.map_err(backend_error)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await
            .map_err(backend_error)?;
        Ok(PostgresSnapshot {
            tx,
            locks: Vec::new(),
        })
    }

    async fn commit_snapshot(&self, snapshot: PostgresSnapshot) -> Result<(), StorageError> {
        snapshot.tx.commit().await.map_err(backend_error)
    }

    async fn abort_snapshot(&self, snapshot: PostgresSnapshot) -> Result<(), StorageError> {
        snapshot.tx.rollback().await.map_err(backend_error)
    }

    async fn acquire_import_lock(
        &self,
        snapshot: &mut PostgresSnapshot,
        lock_id: i64,
    ) -> Result<(), StorageError> {
        if snapshot.locks.contains(&lock_id) {
            return Ok(());
        }
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(lock_id)
            .execute(&mut *snapshot.tx)
            .await
            .map_err(|e| StorageError::LockUnavailable {
                lock_id,
                reason: e.to_string(),
            })?;
        snapshot.locks.push(lock_id);
        tracing::trace!(lock_id, "advisory lock acquired");
        Ok(())
    }

    async fn load_party_ids(
        &self,
        snapshot: &mut PostgresSnapshot,
    ) -> Result<HashMap<String, i64>, StorageError> {
        let rows: Vec<(String, i64)> = sqlx::query_as("SELECT code, id FROM parties")
            .fetch_all(&mut *snapshot.tx)
            .await
            .map_err(backend_error)?;
        Ok(rows.into_iter().collect())
    }

    async fn load_constituency_ids(
        &self,
        snapshot: &mut PostgresSnapshot,
    ) -> Result<HashMap<String, i64>, StorageError> {
        let rows: Vec<(String, i64)> = sqlx::query_as("SELECT name, id FROM constituencies")
            .fetch_all(&mut *snapshot.tx)
            .await
            .map_err(backend_error)?;
        Ok(rows.into_iter().collect())
    }

    async fn insert_constituency(
        &self,
        snapshot: &mut PostgresSnapshot,
        name: &str,
    ) -> Result<i64, StorageError> {
        sqlx::query_scalar("INSERT INTO constituencies (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(&mut *snapshot.tx)
            .await
            .map_err(|e| {
                if e.as_database_error()
                    .is_some_and(|db| db.is_unique_violation())
                {
                    StorageError::ConstituencyExists {
                        name: name.to_string(),
                    }
                } else {
                    backend_error(e)
                }
            })
    }

    async fn upsert_result(
        &self,
        snapshot: &mut PostgresSnapshot,
        constituency_id: i64,
        party_id: i64,
        votes: i64,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO results (constituency_id, party_id, votes, last_updated) \
             VALUES ($1, $2, $3, now()) \
             ON CONFLICT (constituency_id, party_id) \
             DO UPDATE SET votes = EXCLUDED.votes, last_updated = now()",
        )
        .bind(constituency_id)
        .bind(party_id)
        .bind(votes)
        .execute(&mut *snapshot.tx)
        .await
        .map_err(|e| {
            let missing_party = e
                .as_database_error()
                .filter(|db| db.is_foreign_key_violation())
                .map(|db| db.constraint() == Some("results_party_fk"));
            match missing_party {
                Some(true) => StorageError::UnknownParty { party_id },
                Some(false) => StorageError::UnknownConstituency { constituency_id },
                None => backend_error(e),
            }
        })?;
        Ok(())
    }

    async fn upsert_parties(
        &self,
        snapshot: &mut PostgresSnapshot,
        parties: &[Party],
    ) -> Result<SeedOutcome, StorageError> {
        let mut outcome = SeedOutcome::default();
        for party in parties {
            let existing: Option<String> =
                sqlx::query_scalar("SELECT name FROM parties WHERE code = $1")
                    .bind(&party.code)
                    .fetch_optional(&mut *snapshot.tx)
                    .await
                    .map_err(backend_error)?;
            match existing {
                Some(name) if name == party.name => {}
                Some(_) => {
                    sqlx::query("UPDATE parties SET name = $2 WHERE code = $1")
                        .bind(&party.code)
                        .bind(&party.name)
                        .execute(&mut *snapshot.tx)
                        .await
                        .map_err(backend_error)?;
                    outcome.renamed += 1;
                }
                None => {
                    sqlx::query("INSERT INTO parties (code, name) VALUES ($1, $2)")
                        .bind(&party.code)
                        .bind(&party.name)
                        .execute(&mut *snapshot.tx)
                        .await
                        .map_err(backend_error)?;
                    outcome.inserted += 1;
                }
            }
        }
        Ok(outcome)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn list_parties(&self) -> Result<Vec<PartyRecord>, StorageError> {
        let rows: Vec<(i64, String, String)> =
            sqlx::query_as("SELECT id, code, name FROM parties ORDER BY code COLLATE \"C\"")
                .fetch_all(&self.pool)
                .await
                .map_err(backend_error)?;
        Ok(rows
            .into_iter()
            .map(|(id, code, name)| PartyRecord { id, code, name })
            .collect())
    }

    async fn list_constituencies(&self) -> Result<Vec<ConstituencyRecord>, StorageError> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, name FROM constituencies ORDER BY name COLLATE \"C\"")
                .fetch_all(&self.pool)
                .await
                .map_err(backend_error)?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| ConstituencyRecord { id, name })
            .collect())
    }

    async fn find_constituency(
        &self,
        name: &str,
    ) -> Result<Option<ConstituencyRecord>, StorageError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, name FROM constituencies WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend_error)?;
        Ok(row.map(|(id, name)| ConstituencyRecord { id, name }))
    }

    async fn results_for_constituency(
        &self,
        constituency_id: i64,
    ) -> Result<Vec<ResultRecord>, StorageError> {
        let rows: Vec<ResultRow> =
            sqlx::query_as(&format!("{RESULT_COLUMNS} WHERE r.constituency_id = $1"))
                .bind(constituency_id)
                .fetch_all(&self.pool)
                .await
                .map_err(backend_error)?;
        rows.into_iter().map(result_record).collect()
    }

    async fn list_results(&self) -> Result<Vec<ResultRecord>, StorageError> {
        let rows: Vec<ResultRow> = sqlx::query_as(RESULT_COLUMNS)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_error)?;
        rows.into_iter().map(result_record).collect()
    }

    async fn constituency_results(&self) -> Result<Vec<ConstituencyResults>, StorageError> {
        let rows: Vec<ConstituencyResultRow> = sqlx::query_as(CONSTITUENCY_RESULTS)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_error)?;

        let mut grouped: Vec<ConstituencyResults> = Vec::new();
        for (id, name, party_id, code, party_name, votes, at) in rows {
            let starts_group = grouped.last().map_or(true, |g| g.constituency.id != id);
            if starts_group {
                grouped.push(ConstituencyResults {
                    constituency: ConstituencyRecord {
                        id,
                        name: name.clone(),
                    },
                    results: Vec::new(),
                });
            }
            let (Some(party_id), Some(code), Some(party_name), Some(votes), Some(at)) =
                (party_id, code, party_name, votes, at)
            else {
                continue;
            };
            let record = result_record((id, name, party_id, code, party_name, votes, at))?;
            if let Some(group) = grouped.last_mut() {
                group.results.push(record);
            }
        }
        Ok(grouped)
    }
}
