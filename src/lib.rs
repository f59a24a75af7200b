//! Session layer for an interactive document-search page.
//!
//! This crate keeps a search page honest while requests race. The
//! addressable location is the single source of truth for what to
//! search: every location change triggers a refresh, and a completion
//! is folded back into view-ready state only while it is still
//! current. The embedding application supplies the actual engine,
//! alert storage, authentication facts and title handling through the
//! [`services`] traits.
//!
//! The usual wiring:
//!
//! 1. Resolve bootstrap data (initial query and result) out of band.
//! 2. Build a [`Location`], seed it from the deep link, and construct a
//!    [`SearchSession`] with the collaborators.
//! 3. Drive the session with [`SearchSession::run`] in a task, or call
//!    [`SearchSession::pump`] from an existing event loop.
//! 4. Render from the session's accessors; edit the location to search.

pub mod alerts;
pub mod location;
pub mod model;
pub mod query;
pub mod services;
pub mod session;

pub use alerts::{AlertCandidate, AlertToggle, MemoryAlerts};
pub use location::{Location, RouteUpdates};
pub use model::{Bootstrap, FacetBucket, Facets, Peek, SearchOutcome, SearchResult};
pub use query::{Params, ParseQueryError, Query};
pub use services::{AlertRegistry, SearchProvider, SessionInfo, TitleSink};
pub use session::{Collaborators, SearchSession, SessionHandles, SessionMsg, ViewEffect};
