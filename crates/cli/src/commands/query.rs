use super::CommandResult;
use crate::config::ServeConfig;
use crate::output::{print_json, print_parties, print_totals, print_view};
use crate::{startup, OutputFormat};

pub(crate) async fn cmd_totals(config: &ServeConfig, output: OutputFormat) -> CommandResult {
    let storage = startup::connect_postgres(config.database_url()?, config.startup).await?;
    let totals = tally_engine::national_totals(&storage).await?;
    match output {
        OutputFormat::Json => print_json(&totals),
        OutputFormat::Text => print_totals(&totals),
    }
    Ok(())
}

pub(crate) async fn cmd_constituency(
    name: &str,
    config: &ServeConfig,
    output: OutputFormat,
) -> CommandResult {
    let storage = startup::connect_postgres(config.database_url()?, config.startup).await?;
    let view = tally_engine::constituency_view(&storage, name)
        .await?
        .ok_or_else(|| format!("Constituency '{}' not found", name))?;
    match output {
        OutputFormat::Json => print_json(&view),
        OutputFormat::Text => print_view(&view),
    }
    Ok(())
}

pub(crate) async fn cmd_parties(config: &ServeConfig, output: OutputFormat) -> CommandResult {
    let storage = startup::connect_postgres(config.database_url()?, config.startup).await?;
    let parties = tally_engine::parties(&storage).await?;
    match output {
        OutputFormat::Json => print_json(&parties),
        OutputFormat::Text => print_parties(&parties),
    }
    Ok(())
}
