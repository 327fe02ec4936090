//! Store connection shared by `serve` and the database commands.

use std::future::Future;

use tally_postgres::PostgresStorage;
use tally_storage::{StorageError, TallyStorage};

use crate::config::RetryPolicy;

/// Run `attempt` until it succeeds or the policy is exhausted.
///
/// Every failure but the last is logged at `warn` and followed by the
/// policy's fixed delay. The last error is returned.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    what: &str,
    mut attempt: F,
) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if tries < policy.max_attempts => {
                tracing::warn!(
                    attempt = tries,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "{what} failed; retrying in {:?}",
                    policy.backoff
                );
                tokio::time::sleep(policy.backoff).await;
            }
            Err(e) => {
                tracing::error!(attempts = tries, error = %e, "{what} failed; giving up");
                return Err(e);
            }
        }
    }
}

/// Connect to PostgreSQL, retrying, and make sure the schema exists.
pub(crate) async fn connect_postgres(
    database_url: &str,
    policy: RetryPolicy,
) -> Result<PostgresStorage, StorageError> {
    let storage = with_retry(policy, "database connection", || async {
        let storage = PostgresStorage::connect(database_url).await?;
        storage.ping().await?;
        Ok(storage)
    })
    .await?;
    storage.init_schema().await?;
    tracing::info!("database ready");
    Ok(storage)
}
