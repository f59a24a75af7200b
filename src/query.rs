//! Query state for a search session.
//!
//! A [`Query`] is an immutable snapshot of the addressable search
//! parameters: free text, filters, entity references and the pagination
//! offset, all held as a string multimap. Mutation goes through the
//! location layer; the session only ever swaps whole snapshots, so two
//! refreshes never see a half-updated query.
//!
//! Serialization is stable: parameters are kept sorted by name, values
//! in insertion order, so the same state always yields the same query
//! string.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::FacetBucket;

/// Parameter carrying the free-text search term.
pub const TEXT_PARAM: &str = "q";
/// Parameter carrying the pagination offset.
pub const OFFSET_PARAM: &str = "offset";
/// Parameter carrying entity references attached to the search.
pub const ENTITY_PARAM: &str = "entity";
/// Filter parameter for collection selections.
pub const COLLECTION_FILTER: &str = "filter:collection_id";

/// Parameter multimap backing a [`Query`].
pub type Params = BTreeMap<String, Vec<String>>;

/// Immutable snapshot of search parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    params: Params,
}

/// Failure to parse a serialized query string.
#[derive(Debug, Error)]
#[error("malformed query string near '{fragment}'")]
pub struct ParseQueryError {
    fragment: String,
}

impl Query {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// All values recorded under `name`, empty if the parameter is absent.
    pub fn list(&self, name: &str) -> &[String] {
        self.params.get(name).map_or(&[], Vec::as_slice)
    }

    /// First value recorded under `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.list(name).first().map(String::as_str)
    }

    /// The free-text term, empty string when unset.
    pub fn text(&self) -> &str {
        self.first(TEXT_PARAM).unwrap_or("")
    }

    /// The pagination offset. Absent or malformed values read as zero.
    pub fn offset(&self) -> u64 {
        self.first(OFFSET_PARAM)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0)
    }

    /// Copy of this query positioned at `offset`, all other parameters
    /// untouched.
    pub fn with_offset(&self, offset: u64) -> Self {
        let mut params = self.params.clone();
        params.insert(OFFSET_PARAM.to_string(), vec![offset.to_string()]);
        Self { params }
    }

    /// Whether `value` is currently selected under the `key` parameter.
    pub fn is_selected(&self, key: &str, value: &str) -> bool {
        self.list(key).iter().any(|selected| selected == value)
    }

    /// Orders facet buckets for display: buckets whose value is selected
    /// under `filter_key` come first, then larger counts, ties broken by
    /// value so the ordering is total.
    pub fn sort_facet(&self, buckets: &[FacetBucket], filter_key: &str) -> Vec<FacetBucket> {
        let mut sorted = buckets.to_vec();
        sorted.sort_by(|a, b| {
            let a_selected = self.is_selected(filter_key, &a.value);
            let b_selected = self.is_selected(filter_key, &b.value);
            b_selected
                .cmp(&a_selected)
                .then_with(|| b.count.cmp(&a.count))
                .then_with(|| a.value.cmp(&b.value))
        });
        sorted
    }

    /// Stable percent-encoded serialization of all parameters.
    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |value| (name, value)))
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(name),
                    urlencoding::encode(value)
                )
            })
            .join("&")
    }

    /// Parses a query string produced by [`Query::to_query_string`] (or a
    /// browser location). Fails only when a percent sequence decodes to
    /// invalid UTF-8.
    pub fn from_query_string(raw: &str) -> Result<Self, ParseQueryError> {
        let mut params = Params::new();
        for pair in raw.split('&').filter(|pair| !pair.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let name = decode(name, pair)?;
            let value = decode(value, pair)?;
            params.entry(name).or_default().push(value);
        }
        Ok(Self { params })
    }
}

fn decode(part: &str, pair: &str) -> Result<String, ParseQueryError> {
    urlencoding::decode(part)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ParseQueryError {
            fragment: pair.to_string(),
        })
}
