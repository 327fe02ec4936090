//! Rendering shared by the subcommands and the HTTP API.

use serde::Serialize;
use tally_core::{ConstituencyView, IngestionSummary, NationalTotals};
use tally_storage::PartyRecord;

use crate::OutputFormat;

pub(crate) const MSG_IMPORT_COMPLETED: &str = "Import completed";
pub(crate) const MSG_IMPORT_EMPTY: &str = "Import completed. File contained no data lines.";

/// The import response body: a message plus the summary counters.
pub(crate) fn summary_json(summary: &IngestionSummary) -> serde_json::Value {
    let message = if summary.total_lines == 0 {
        MSG_IMPORT_EMPTY
    } else {
        MSG_IMPORT_COMPLETED
    };
    serde_json::json!({
        "message": message,
        "total_lines": summary.total_lines,
        "processed_lines": summary.processed_lines,
        "skipped_lines": summary.skipped_lines,
        "upserted_results": summary.upserted_results,
        "errors": summary.errors,
    })
}

pub(crate) fn print_json<T: Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
    println!("{}", json);
}

pub(crate) fn report_error(msg: &str, output: OutputFormat) {
    match output {
        OutputFormat::Text => eprintln!("error: {}", msg),
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": msg })),
    }
}

pub(crate) fn print_summary(summary: &IngestionSummary, output: OutputFormat) {
    match output {
        OutputFormat::Json => print_json(&summary_json(summary)),
        OutputFormat::Text => {
            if summary.total_lines == 0 {
                println!("{}", MSG_IMPORT_EMPTY);
                return;
            }
            println!("{}", MSG_IMPORT_COMPLETED);
            println!("  Lines:     {}", summary.total_lines);
            println!("  Processed: {}", summary.processed_lines);
            println!("  Skipped:   {}", summary.skipped_lines);
            println!("  Upserted:  {}", summary.upserted_results);
            if !summary.errors.is_empty() {
                println!();
                for e in &summary.errors {
                    println!("  line {}: {} ({:?})", e.line_number, e.message, e.line);
                }
                if summary.dropped_errors > 0 {
                    println!("  ... {} more diagnostics not shown", summary.dropped_errors);
                }
            }
        }
    }
}

pub(crate) fn print_view(view: &ConstituencyView) {
    println!("{}", view.name);
    match &view.winning_party {
        Some(w) => println!("  Winner: {} ({}) with {} votes", w.party_name, w.party_code, w.votes),
        None => println!("  Winner: none"),
    }
    println!("  Total votes: {}", view.total_votes);
    for p in &view.parties {
        println!(
            "    {:<6} {:>10} {:>7.2}%  {}",
            p.party_code, p.votes, p.percentage, p.party_name
        );
    }
}

pub(crate) fn print_totals(totals: &NationalTotals) {
    println!(
        "National totals: {} votes across {} constituencies",
        totals.overall.total_votes, totals.overall.total_constituencies
    );
    println!();
    println!("  Votes");
    for p in &totals.total_votes_per_party {
        println!("    {:<6} {:>10}  {}", p.party_code, p.votes, p.party_name);
    }
    println!();
    println!("  Seats");
    for p in &totals.total_mps_per_party {
        println!("    {:<6} {:>10}  {}", p.party_code, p.seats, p.party_name);
    }
}

pub(crate) fn print_parties(parties: &[PartyRecord]) {
    for p in parties {
        println!("{:<6} {}", p.code, p.name);
    }
}
