use super::CommandResult;
use crate::config::ServeConfig;
use crate::output::print_json;
use crate::{startup, OutputFormat};

/// `tally seed`: bring the party table in line with the registry.
pub(crate) async fn cmd_seed(config: &ServeConfig, output: OutputFormat) -> CommandResult {
    let registry = config.registry()?;
    let storage = startup::connect_postgres(config.database_url()?, config.startup).await?;
    let outcome = tally_engine::seed_parties(&storage, &registry).await?;
    match output {
        OutputFormat::Json => print_json(&outcome),
        OutputFormat::Text => println!(
            "Seeded {} parties ({} inserted, {} renamed)",
            registry.len(),
            outcome.inserted,
            outcome.renamed
        ),
    }
    Ok(())
}
