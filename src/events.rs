//! Commit notifications for external observers.
//!
//! Every non-empty commit emits two events: statements removed, then
//! statements inserted. Each event carries both the raw staged set and the
//! set actually applied after the hazard filter, so observers can distinguish
//! "asked for" from "happened".

use crate::statement::Statement;

/// Payload of a commit notification.
#[derive(Debug, Clone, Default)]
pub struct StatementsEvent {
    /// The set as it was staged before reconciliation.
    pub staged: Vec<Statement>,
    /// The set actually applied to the backend after the hazard filter.
    pub applied: Vec<Statement>,
}

/// External observer of commit activity.
///
/// Callbacks run on the committing thread while the store's write lock is
/// held; keep them short.
pub trait CommitObserver: Send + Sync {
    fn statements_removed(&self, _event: &StatementsEvent) {}

    fn statements_inserted(&self, _event: &StatementsEvent) {}
}
