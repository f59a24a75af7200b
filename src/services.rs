//! Collaborator contracts the session consumes.
//!
//! The session owns no engine and no alert storage; it talks to the
//! embedding application through these seams, held as `Arc<dyn ...>`
//! so the same implementations can back many sessions.
//!
//! The traits are synchronous. The session dispatches provider calls on
//! blocking tasks, so implementations are free to perform blocking I/O;
//! they must also tolerate overlapping invocations, since an in-flight
//! request is never awaited before the next one starts.

use anyhow::Result;

use crate::alerts::{AlertCandidate, AlertToggle};
use crate::model::{Peek, SearchOutcome};
use crate::query::Query;

/// Executes search and preview requests.
pub trait SearchProvider: Send + Sync {
    /// Runs a full search for `query`. The outcome echoes the query that
    /// was actually executed, which the session adopts as its new state.
    ///
    /// An `Err` is surfaced to the session as an error-shaped result; it
    /// does not abort the session.
    fn search(&self, query: &Query) -> Result<SearchOutcome>;

    /// Resolves the preview payload for `query`.
    ///
    /// Failures degrade to [`Peek::inactive`]; there is no error path
    /// for previews.
    fn peek(&self, query: &Query) -> Result<Peek>;
}

/// Registry of standing alerts.
pub trait AlertRegistry: Send + Sync {
    /// Whether an alert matching `candidate` already exists.
    fn check(&self, candidate: &AlertCandidate) -> bool;

    /// Whether `candidate` could be created. Validity rules belong to
    /// the registry; the session assumes nothing beyond non-emptiness.
    fn valid(&self, candidate: &AlertCandidate) -> bool;

    /// Creates the alert if absent, removes it otherwise.
    fn toggle(&self, candidate: &AlertCandidate) -> Result<AlertToggle>;
}

/// Authentication facts the page was loaded under.
pub trait SessionInfo: Send + Sync {
    fn authenticated(&self) -> bool;
}

/// Receives page-title updates.
///
/// `section` names the application area (always `"documents"` for this
/// session) so the embedder can highlight navigation.
pub trait TitleSink: Send + Sync {
    fn set(&self, title: &str, section: &str);
}
