//! tally-core: election night tally core library.
//!
//! Pure domain logic shared by the storage backends, the ingestion engine and
//! the CLI. Nothing in this crate performs I/O.
//!
//! # Public API
//!
//! - [`PartyRegistry`] -- the fixed, ordered party code registry
//! - [`tokenize_line`], [`report_lines`], [`strip_bom`] -- report parsing
//! - [`parse_vote_count`] -- vote token interpretation
//! - [`resolve_pair`] -- order-agnostic party/vote pair resolution
//! - [`plan_line`] -- full per-line decision with diagnostics
//! - [`IngestionSummary`] -- per-report statistics and bounded error log
//! - [`constituency_view`], [`national_totals`] -- read-side aggregation

pub mod error;
pub mod line;
pub mod normalize;
pub mod pair;
pub mod registry;
pub mod report;
pub mod summary;
pub mod tally;

// ── Convenience re-exports ───────────────────────────────────────────

pub use error::{LineError, RegistryError};
pub use line::{report_lines, strip_bom, tokenize_line};
pub use normalize::{parse_vote_count, VoteCount, MAX_VOTE_COUNT};
pub use pair::{resolve_pair, ResolvedPair};
pub use registry::{Party, PartyRegistry};
pub use report::{plan_line, AcceptedLine, LinePlan, PlannedLine};
pub use summary::{IngestionSummary, LineDiagnostic, MAX_ERROR_DETAILS};
pub use tally::{
    constituency_view, national_totals, ConstituencyView, NationalTotals, OverallTotals,
    PartySeatTotal, PartyShare, PartyVoteTotal, PartyVotes, TalliedResult, WinningParty,
};
