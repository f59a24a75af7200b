//! Addressable location state and route-update notifications.
//!
//! [`Location`] plays the role of the browser location: it owns the
//! shared parameter multimap and notifies subscribers whenever the
//! parameters actually change. The session never edits filters itself;
//! the view (or deep-link handling) writes here and the session reacts
//! to the resulting route update.
//!
//! Subscriptions are scoped: a [`RouteUpdates`] deregisters itself when
//! dropped, so a session that goes away stops listening with it. Rapid
//! consecutive changes may coalesce into a single notification; the
//! subscriber always observes the latest state when it looks.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::query::{ParseQueryError, Params, Query};

/// Shared, cheaply cloneable location handle.
#[derive(Clone)]
pub struct Location {
    inner: Arc<Inner>,
}

struct Inner {
    params: RwLock<Params>,
    version: watch::Sender<u64>,
}

impl Location {
    pub fn new() -> Self {
        Self::with_params(Params::new())
    }

    pub fn with_params(params: Params) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                params: RwLock::new(params),
                version,
            }),
        }
    }

    /// Location seeded from a serialized query string, as when the page
    /// is entered through a deep link.
    pub fn from_query_string(raw: &str) -> Result<Self, ParseQueryError> {
        let query = Query::from_query_string(raw)?;
        Ok(Self::with_params(query.params().clone()))
    }

    /// Immutable snapshot of the current parameters.
    pub fn current(&self) -> Query {
        Query::new(self.inner.params.read().clone())
    }

    /// Replaces the values under `name` with a single value.
    pub fn set(&self, name: &str, value: impl Into<String>) {
        self.set_list(name, vec![value.into()]);
    }

    /// Replaces the values under `name`. An empty list removes the
    /// parameter entirely.
    pub fn set_list(&self, name: &str, values: Vec<String>) {
        self.mutate(|params| {
            if values.is_empty() {
                params.remove(name).is_some()
            } else if params.get(name).is_some_and(|current| *current == values) {
                false
            } else {
                params.insert(name.to_string(), values.clone());
                true
            }
        });
    }

    /// Adds `value` under `name` if absent, removes it otherwise.
    pub fn toggle(&self, name: &str, value: &str) {
        self.mutate(|params| {
            let values = params.entry(name.to_string()).or_default();
            match values.iter().position(|existing| existing == value) {
                Some(index) => {
                    values.remove(index);
                }
                None => values.push(value.to_string()),
            }
            if values.is_empty() {
                params.remove(name);
            }
            true
        });
    }

    pub fn remove(&self, name: &str) {
        self.mutate(|params| params.remove(name).is_some());
    }

    /// Replaces the whole location with `query`'s parameters, as a page
    /// navigation would.
    pub fn navigate(&self, query: &Query) {
        self.mutate(|params| {
            if params == query.params() {
                false
            } else {
                *params = query.params().clone();
                true
            }
        });
    }

    /// Registers a route-update listener. Dropping the returned value
    /// deregisters it.
    pub fn subscribe(&self) -> RouteUpdates {
        RouteUpdates {
            rx: self.inner.version.subscribe(),
        }
    }

    /// Number of live route-update subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.version.receiver_count()
    }

    /// Applies `edit` under the write lock and bumps the version when it
    /// reports an actual change. No-op writes stay silent, mirroring a
    /// browser that does not fire route events for identical URLs.
    fn mutate(&self, edit: impl FnOnce(&mut Params) -> bool) {
        let changed = {
            let mut params = self.inner.params.write();
            edit(&mut params)
        };
        if changed {
            self.inner.version.send_modify(|version| *version += 1);
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Location")
            .field("params", &*self.inner.params.read())
            .field("version", &*self.inner.version.borrow())
            .finish()
    }
}

/// Live route-update subscription, deregistered on drop.
pub struct RouteUpdates {
    rx: watch::Receiver<u64>,
}

impl RouteUpdates {
    /// Waits for the next route change. Returns `Err` when the location
    /// itself has gone away.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }

    /// Whether a change happened since the last time it was seen.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Marks the current state as seen without waiting.
    pub fn mark_seen(&mut self) {
        self.rx.borrow_and_update();
    }
}
