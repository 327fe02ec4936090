//! tally-storage: the `TallyStorage` trait and its in-memory backend.
//!
//! Backends implement [`TallyStorage`] and prove it by running
//! [`conformance::run_conformance_suite`] from their own tests.

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{MemorySnapshot, MemoryStorage};
pub use record::{
    ConstituencyRecord, ConstituencyResults, PartyRecord, ResultRecord, SeedOutcome,
};
pub use traits::TallyStorage;
