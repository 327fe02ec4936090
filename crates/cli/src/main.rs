mod commands;
mod config;
mod logging;
mod output;
mod serve;
mod startup;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::ServeConfig;
use crate::output::report_error;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Storage backend for `serve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum StoreKind {
    /// PostgreSQL at DATABASE_URL
    Postgres,
    /// Process-local store; contents are lost on exit
    Memory,
}

/// Election night results tally.
#[derive(Parser)]
#[command(name = "tally", version, about = "Election night results tally")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8000")]
        port: u16,
        /// Storage backend
        #[arg(long, value_enum, default_value = "postgres")]
        store: StoreKind,
    },

    /// Ingest a results report into the database
    Import {
        /// Path to the report file
        file: PathBuf,
    },

    /// Dry-run a results report against an empty in-memory store
    Check {
        /// Path to the report file
        file: PathBuf,
    },

    /// Print national vote and seat totals
    Totals,

    /// Print the breakdown for one constituency
    Constituency {
        /// Exact constituency name
        name: String,
    },

    /// Insert or refresh the party registry in the database
    Seed,

    /// List the seeded parties
    Parties,
}

fn main() {
    let cli = Cli::parse();
    let config = ServeConfig::from_env();
    logging::init_tracing(config.log_json);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to create tokio runtime: {}", e), cli.output);
            process::exit(1);
        }
    };

    let output = cli.output;
    let result = match cli.command {
        Commands::Serve { port, store } => rt.block_on(serve::run(port, store, &config)),
        Commands::Import { file } => rt.block_on(commands::cmd_import(&file, &config, output)),
        Commands::Check { file } => rt.block_on(commands::cmd_check(&file, &config, output)),
        Commands::Totals => rt.block_on(commands::cmd_totals(&config, output)),
        Commands::Constituency { name } => {
            rt.block_on(commands::cmd_constituency(&name, &config, output))
        }
        Commands::Seed => rt.block_on(commands::cmd_seed(&config, output)),
        Commands::Parties => rt.block_on(commands::cmd_parties(&config, output)),
    };

    if let Err(e) = result {
        report_error(&e.to_string(), output);
        process::exit(1);
    }
}
