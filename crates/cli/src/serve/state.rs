use tally_core::PartyRegistry;

/// Application state shared across request handlers.
pub(crate) struct AppState<S> {
    pub(crate) storage: S,
    /// Registry used to interpret uploaded reports.
    pub(crate) registry: PartyRegistry,
}
