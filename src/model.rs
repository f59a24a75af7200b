//! Result-side types for a search session.
//!
//! A session holds exactly one [`SearchResult`] at a time, replaced
//! wholesale on every refresh. Matched documents stay opaque JSON: the
//! session layer derives facets and eligibility from a result but never
//! inspects the documents themselves.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::query::Query;

/// Facet category the session derives for the view.
pub const COLLECTIONS_FACET: &str = "collections";

/// One value bucket inside a facet category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetBucket {
    pub value: String,
    pub count: u64,
}

impl FacetBucket {
    pub fn new(value: impl Into<String>, count: u64) -> Self {
        Self {
            value: value.into(),
            count,
        }
    }
}

/// Facet categories by name (e.g. `"collections"`), each a list of buckets.
pub type Facets = BTreeMap<String, Vec<FacetBucket>>;

/// Outcome of executing a [`Query`].
///
/// Error results are terminal: they carry no facets and leave the
/// query ineligible for alerts until the next successful refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SearchResult {
    Error {
        message: String,
    },
    Hits {
        facets: Facets,
        /// Matched documents; opaque to the session layer.
        documents: Vec<serde_json::Value>,
        total: u64,
    },
}

impl SearchResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Successful result with no facets and no documents.
    pub fn empty() -> Self {
        Self::Hits {
            facets: Facets::new(),
            documents: Vec::new(),
            total: 0,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Buckets of the named facet category; empty for error results.
    pub fn facet(&self, name: &str) -> &[FacetBucket] {
        match self {
            Self::Error { .. } => &[],
            Self::Hits { facets, .. } => facets.get(name).map_or(&[], Vec::as_slice),
        }
    }
}

/// Lightweight preview payload shown next to the results.
///
/// Only queries with a free-text term longer than one character get a
/// peek; everything else carries the inactive sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peek {
    pub active: bool,
    pub total: Option<u64>,
}

impl Peek {
    /// The `{active: false}` sentinel.
    pub fn inactive() -> Self {
        Self {
            active: false,
            total: None,
        }
    }

    pub fn active(total: u64) -> Self {
        Self {
            active: true,
            total: Some(total),
        }
    }
}

impl Default for Peek {
    fn default() -> Self {
        Self::inactive()
    }
}

/// The `{query, result}` pair a search execution resolves to.
///
/// The provider may normalize the query it actually ran and echo the
/// normalized form here; the session adopts it as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub query: Query,
    pub result: SearchResult,
}

impl SearchOutcome {
    pub fn new(query: Query, result: SearchResult) -> Self {
        Self { query, result }
    }
}

/// Data the page loader hands the session at construction.
///
/// Bootstrap data is trusted: it runs through the same state-update
/// procedure as a refresh, but without issuing any requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bootstrap {
    pub query: Query,
    pub result: SearchResult,
    #[serde(default)]
    pub peek: Peek,
}

impl Bootstrap {
    pub fn new(query: Query, result: SearchResult) -> Self {
        Self {
            query,
            result,
            peek: Peek::inactive(),
        }
    }

    /// Attach a preview payload resolved by the loader.
    pub fn with_peek(mut self, peek: Peek) -> Self {
        self.peek = peek;
        self
    }
}
