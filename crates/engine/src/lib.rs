//! tally-engine: ingestion and read-side views over a `TallyStorage`.
//!
//! [`ingest`] applies one results report atomically under the import lock.
//! The view functions read committed state only and never block on imports.

pub mod error;
pub mod ingest;
pub mod seed;
pub mod views;

pub use error::EngineError;
pub use ingest::{ingest, IMPORT_LOCK_ID};
pub use seed::seed_parties;
pub use views::{all_constituency_views, constituency_view, national_totals, parties};
