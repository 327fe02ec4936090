use sqlx::PgPool;
use tally_storage::StorageError;

use crate::backend_error;

/// Tables and constraints backing the tally store.
///
/// Statements are idempotent so the schema can be applied on every startup.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS parties (
    id   BIGSERIAL PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS constituencies (
    id   BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    CONSTRAINT constituencies_name_key UNIQUE (name)
);

CREATE TABLE IF NOT EXISTS results (
    id              BIGSERIAL PRIMARY KEY,
    constituency_id BIGINT NOT NULL,
    party_id        BIGINT NOT NULL,
    votes           BIGINT NOT NULL CHECK (votes >= 0),
    last_updated    TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT results_constituency_party_key UNIQUE (constituency_id, party_id),
    CONSTRAINT results_constituency_fk FOREIGN KEY (constituency_id)
        REFERENCES constituencies (id) ON DELETE CASCADE,
    CONSTRAINT results_party_fk FOREIGN KEY (party_id)
        REFERENCES parties (id)
);

CREATE INDEX IF NOT EXISTS results_party_idx ON results (party_id);
"#;

/// Apply [`SCHEMA`] to the database behind `pool`.
pub async fn init_schema(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(backend_error)?;
    tracing::debug!("tally schema ensured");
    Ok(())
}

/// Empty every table and reset id sequences.
///
/// Intended for test fixtures that need a fresh store per case.
pub async fn reset(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::raw_sql("TRUNCATE results, constituencies, parties RESTART IDENTITY CASCADE")
        .execute(pool)
        .await
        .map_err(backend_error)?;
    Ok(())
}
