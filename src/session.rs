//! The search session controller.
//!
//! Ties the crate together: a session watches a [`Location`] for route
//! updates and turns each one into a refresh, issuing search and peek
//! requests through a [`SearchProvider`] and folding the completions
//! back into view-ready state.
//!
//! ```text
//!   view edits Location ──▶ route update ──▶ refresh (seq += 1)
//!                                             ├─▶ search task
//!                                             └─▶ peek task
//!                                                      │
//!                       completions tagged with seq ◀──┘
//!                                 │
//!                   stale seq discarded, latest applied
//!                                 │
//!                 facets ▶ state ▶ title ▶ loading cleared
//! ```
//!
//! Search and peek run as independent tasks with no ordering between
//! them. Every completion carries the sequence number of the refresh
//! that issued it; anything but the latest sequence is discarded, so a
//! slow early response can never clobber the result of a later refresh.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::alerts::{AlertCandidate, AlertToggle};
use crate::location::{Location, RouteUpdates};
use crate::model::{Bootstrap, COLLECTIONS_FACET, FacetBucket, Peek, SearchOutcome, SearchResult};
use crate::query::{COLLECTION_FILTER, ENTITY_PARAM, Query};
use crate::services::{AlertRegistry, SearchProvider, SessionInfo, TitleSink};

/// Minimum free-text length (in characters) for peek previews.
const PEEK_MIN_CHARS: usize = 2;
/// Minimum free-text length (in characters) for a text alert.
const ALERT_TEXT_MIN_CHARS: usize = 3;
/// Application section reported with every title update.
const TITLE_SECTION: &str = "documents";

/// Completion messages the refresh tasks feed back to the session.
#[derive(Debug)]
pub enum SessionMsg {
    /// The search request resolved, or was rejected by the provider.
    SearchDone {
        seq: u64,
        outcome: Result<SearchOutcome>,
    },
    /// The peek request resolved.
    PeekDone { seq: u64, peek: Peek },
}

/// Side effects the session asks the embedding view to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEffect {
    /// Scroll back to the results anchor after a page change.
    ScrollToAnchor,
}

/// Collaborators a session consumes, shared across sessions.
#[derive(Clone)]
pub struct Collaborators {
    pub provider: Arc<dyn SearchProvider>,
    pub alerts: Arc<dyn AlertRegistry>,
    pub session_info: Arc<dyn SessionInfo>,
    pub title: Arc<dyn TitleSink>,
}

/// Receiver ends of the session's reporting side-channels.
pub struct SessionHandles {
    /// True while a search request is in flight. Starts true and clears
    /// once the bootstrap state is applied.
    pub loading: watch::Receiver<bool>,
    /// Effects for the view to perform, in order.
    pub effects: mpsc::UnboundedReceiver<ViewEffect>,
}

/// One search page's worth of state and the machinery that refreshes it.
pub struct SearchSession {
    query: Query,
    result: SearchResult,
    peek: Peek,
    collection_facet: Vec<FacetBucket>,
    query_string: String,
    original_text: String,

    location: Location,
    route: RouteUpdates,
    collab: Collaborators,

    seq: u64,
    search_task: Option<JoinHandle<()>>,
    peek_task: Option<JoinHandle<()>>,

    loading_tx: watch::Sender<bool>,
    effects_tx: mpsc::UnboundedSender<ViewEffect>,
    msg_tx: mpsc::UnboundedSender<SessionMsg>,
    msg_rx: mpsc::UnboundedReceiver<SessionMsg>,
}

/// What woke the driver loop.
enum Wake {
    Route,
    Completion(SessionMsg),
    Idle,
    Stop,
}

impl SearchSession {
    /// Builds a session from loader-resolved bootstrap data.
    ///
    /// The route subscription is registered here, once; it lives exactly
    /// as long as the session. Bootstrap data runs through the same
    /// state-update procedure as a refresh, so the title and loading
    /// flag are settled before the first route event arrives.
    pub fn new(
        location: Location,
        collab: Collaborators,
        bootstrap: Bootstrap,
    ) -> (Self, SessionHandles) {
        let (loading_tx, loading_rx) = watch::channel(true);
        let (effects_tx, effects_rx) = mpsc::unbounded_channel();
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let route = location.subscribe();

        let mut session = Self {
            query: Query::default(),
            result: SearchResult::empty(),
            peek: bootstrap.peek,
            collection_facet: Vec::new(),
            query_string: String::new(),
            original_text: String::new(),
            location,
            route,
            collab,
            seq: 0,
            search_task: None,
            peek_task: None,
            loading_tx,
            effects_tx,
            msg_tx,
            msg_rx,
        };
        session.update_search(SearchOutcome::new(bootstrap.query, bootstrap.result));
        let handles = SessionHandles {
            loading: loading_rx,
            effects: effects_rx,
        };
        (session, handles)
    }

    /// The query the current result was produced for.
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn result(&self) -> &SearchResult {
        &self.result
    }

    pub fn peek(&self) -> Peek {
        self.peek
    }

    /// Collection facet buckets, ordered for display. Retains the last
    /// successful derivation across error results.
    pub fn collection_facet(&self) -> &[FacetBucket] {
        &self.collection_facet
    }

    /// Serialized form of the applied query, for links and exports.
    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    /// Raw free-text term of the applied query, empty when unset.
    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn is_loading(&self) -> bool {
        *self.loading_tx.borrow()
    }

    /// Whether the current query qualifies for a preview.
    pub fn has_peek(&self) -> bool {
        wants_peek(self.query.text())
    }

    /// What saving the current search as an alert would store.
    ///
    /// The free text is included only when it is at least three
    /// characters long; an entity reference only when the query filters
    /// on exactly one entity. Both conditions are independent.
    pub fn alert_candidate(&self) -> AlertCandidate {
        let mut candidate = AlertCandidate::default();
        if self.original_text.chars().count() >= ALERT_TEXT_MIN_CHARS {
            candidate = candidate.with_query_text(self.original_text.clone());
        }
        if let [entity] = self.query.list(ENTITY_PARAM) {
            candidate = candidate.with_entity(entity.clone());
        }
        candidate
    }

    /// Whether an alert for the current candidate already exists.
    pub fn has_alert(&self) -> bool {
        self.collab.alerts.check(&self.alert_candidate())
    }

    /// Whether the current search could be saved as an alert: requires
    /// an authenticated session, a non-error result and a candidate the
    /// registry accepts.
    pub fn can_create_alert(&self) -> bool {
        if !self.collab.session_info.authenticated() {
            return false;
        }
        if self.result.is_error() {
            return false;
        }
        self.collab.alerts.valid(&self.alert_candidate())
    }

    /// Creates or removes the alert for the current candidate. Session
    /// state is untouched; eligibility is recomputed on the next read.
    pub fn toggle_alert(&self) -> Result<AlertToggle> {
        let candidate = self.alert_candidate();
        let toggled = self.collab.alerts.toggle(&candidate)?;
        info!(
            ?toggled,
            query_text = ?candidate.query_text,
            entity_id = ?candidate.entity_id,
            "alert toggled"
        );
        Ok(toggled)
    }

    /// Moves to a new page offset.
    ///
    /// This only rewrites the location and asks the view to scroll back
    /// to the results anchor. The refresh happens through the resulting
    /// route update, never here, so offset changes behave exactly like
    /// any other route change.
    pub fn load_offset(&self, offset: u64) {
        debug!(offset, "navigating to page offset");
        self.location.navigate(&self.query.with_offset(offset));
        let _ = self.effects_tx.send(ViewEffect::ScrollToAnchor);
    }

    /// Drives the session until `shutdown` flips to true or its sender
    /// is dropped. Route updates trigger refreshes; completions are
    /// folded into state as they arrive.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!("search session driver started");
        loop {
            let wake = {
                let route = &mut self.route;
                let completions = &mut self.msg_rx;
                tokio::select! {
                    changed = route.changed() => match changed {
                        Ok(()) => Wake::Route,
                        Err(_) => Wake::Stop,
                    },
                    msg = completions.recv() => match msg {
                        Some(msg) => Wake::Completion(msg),
                        None => Wake::Stop,
                    },
                    res = shutdown.changed() => match res {
                        Ok(()) if !*shutdown.borrow() => Wake::Idle,
                        _ => Wake::Stop,
                    },
                }
            };
            match wake {
                Wake::Route => self.refresh(),
                Wake::Completion(msg) => self.handle_msg(msg),
                Wake::Idle => {}
                Wake::Stop => break,
            }
        }
        info!("search session driver stopped");
    }

    /// Non-blocking pump for embedders that own their own event loop:
    /// applies any pending route update and all ready completions.
    /// Returns true if session state may have changed. Must run inside a
    /// Tokio runtime, since refreshes spawn their requests on it.
    pub fn pump(&mut self) -> bool {
        let mut woke = false;
        if self.route.has_changed() {
            self.route.mark_seen();
            self.refresh();
            woke = true;
        }
        while let Ok(msg) = self.msg_rx.try_recv() {
            self.handle_msg(msg);
            woke = true;
        }
        woke
    }

    /// Starts a new refresh cycle: bumps the sequence number, flags
    /// loading, drops any in-flight requests and issues fresh ones for
    /// the location as it stands right now.
    fn refresh(&mut self) {
        self.seq += 1;
        let seq = self.seq;
        self.set_loading(true);
        if let Some(task) = self.search_task.take() {
            task.abort();
        }
        if let Some(task) = self.peek_task.take() {
            task.abort();
        }

        // Peek eligibility is judged on the query that is currently
        // applied, not the one being fetched; the applied state is what
        // the page is showing while the refresh runs.
        let peek_wanted = self.has_peek();
        let query = self.location.current();
        info!(
            seq,
            q = query.text(),
            offset = query.offset(),
            peek = peek_wanted,
            "search refresh started"
        );

        let provider = Arc::clone(&self.collab.provider);
        let tx = self.msg_tx.clone();
        let search_query = query.clone();
        self.search_task = Some(tokio::task::spawn_blocking(move || {
            let outcome = provider.search(&search_query);
            let _ = tx.send(SessionMsg::SearchDone { seq, outcome });
        }));

        if peek_wanted {
            let provider = Arc::clone(&self.collab.provider);
            let tx = self.msg_tx.clone();
            self.peek_task = Some(tokio::task::spawn_blocking(move || {
                let peek = provider.peek(&query).unwrap_or_else(|err| {
                    debug!(error = %err, "peek request failed, treating as inactive");
                    Peek::inactive()
                });
                let _ = tx.send(SessionMsg::PeekDone { seq, peek });
            }));
        } else {
            self.peek = Peek::inactive();
        }
    }

    fn handle_msg(&mut self, msg: SessionMsg) {
        match msg {
            SessionMsg::SearchDone { seq, outcome } => self.apply_search(seq, outcome),
            SessionMsg::PeekDone { seq, peek } => self.apply_peek(seq, peek),
        }
    }

    fn apply_search(&mut self, seq: u64, outcome: Result<SearchOutcome>) {
        if seq != self.seq {
            debug!(seq, current = self.seq, "discarding stale search completion");
            return;
        }
        self.search_task = None;
        let outcome = outcome.unwrap_or_else(|err| {
            // A rejected request still has to settle the page, so it
            // collapses into an error-shaped result for the query that
            // is already applied.
            warn!(error = %err, "search request failed");
            SearchOutcome::new(self.query.clone(), SearchResult::error(err.to_string()))
        });
        self.update_search(outcome);
    }

    fn apply_peek(&mut self, seq: u64, peek: Peek) {
        if seq != self.seq {
            debug!(seq, current = self.seq, "discarding stale peek completion");
            return;
        }
        self.peek_task = None;
        self.peek = peek;
    }

    /// The state-update procedure every applied outcome runs through,
    /// bootstrap included. Error results skip facet derivation, leaving
    /// the previous buckets in place. Always ends by updating the title
    /// and clearing the loading flag.
    fn update_search(&mut self, outcome: SearchOutcome) {
        let SearchOutcome { query, result } = outcome;
        if !result.is_error() {
            self.collection_facet =
                query.sort_facet(result.facet(COLLECTIONS_FACET), COLLECTION_FILTER);
        }
        self.query = query;
        self.result = result;
        self.query_string = self.query.to_query_string();
        self.original_text = self.query.text().to_string();

        if self.original_text.is_empty() {
            self.collab.title.set("Search documents", TITLE_SECTION);
        } else {
            let title = format!("Search for '{}'", self.original_text);
            self.collab.title.set(&title, TITLE_SECTION);
        }
        self.set_loading(false);
        debug!(
            q = %self.original_text,
            facets = self.collection_facet.len(),
            error = self.result.is_error(),
            "search state updated"
        );
    }

    fn set_loading(&self, loading: bool) {
        self.loading_tx.send_replace(loading);
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        for task in [self.search_task.take(), self.peek_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}

fn wants_peek(text: &str) -> bool {
    text.chars().count() >= PEEK_MIN_CHARS
}
