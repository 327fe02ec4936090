//! Subcommands other than `serve`.
//!
//! Each command returns a boxed error; `main` reports it in the selected
//! output format and exits with status 1.

mod import;
mod query;
mod seed;

pub(crate) use import::{cmd_check, cmd_import};
pub(crate) use query::{cmd_constituency, cmd_parties, cmd_totals};
pub(crate) use seed::cmd_seed;

pub(crate) type CommandResult = Result<(), Box<dyn std::error::Error>>;
