use std::path::Path;

use tally_engine::{ingest, seed_parties};
use tally_storage::MemoryStorage;

use super::CommandResult;
use crate::config::ServeConfig;
use crate::output::print_summary;
use crate::{startup, OutputFormat};

fn read_report(file: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(file)
        .map_err(|e| format!("cannot read {}: {}", file.display(), e))?;
    String::from_utf8(bytes)
        .map_err(|_| format!("{}: file must be UTF-8 encoded text", file.display()).into())
}

/// `tally import <file>`: ingest into PostgreSQL.
pub(crate) async fn cmd_import(file: &Path, config: &ServeConfig, output: OutputFormat) -> CommandResult {
    let report = read_report(file)?;
    let registry = config.registry()?;
    let storage = startup::connect_postgres(config.database_url()?, config.startup).await?;
    seed_parties(&storage, &registry).await?;
    let summary = ingest(&storage, &registry, &report).await?;
    print_summary(&summary, output);
    Ok(())
}

/// `tally check <file>`: dry run against a fresh in-memory store.
pub(crate) async fn cmd_check(file: &Path, config: &ServeConfig, output: OutputFormat) -> CommandResult {
    let report = read_report(file)?;
    let registry = config.registry()?;
    let storage = MemoryStorage::new();
    seed_parties(&storage, &registry).await?;
    let summary = ingest(&storage, &registry, &report).await?;
    print_summary(&summary, output);
    Ok(())
}
