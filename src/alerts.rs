//! Alert candidates and a bundled in-memory registry.
//!
//! An alert is a saved search the backend re-runs on new data. The
//! session never stores alerts itself; it derives an [`AlertCandidate`]
//! from its current state and leaves every decision about it to an
//! [`AlertRegistry`](crate::services::AlertRegistry).

use std::collections::BTreeSet;

use anyhow::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::services::AlertRegistry;

/// What the session would save as an alert right now.
///
/// Both fields are derived independently and may be absent; an empty
/// candidate is never valid to create.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlertCandidate {
    /// Free-text term, present only when long enough to be meaningful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_text: Option<String>,
    /// Entity reference, present only when the query filters on exactly
    /// one entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl AlertCandidate {
    pub fn with_query_text(mut self, text: impl Into<String>) -> Self {
        self.query_text = Some(text.into());
        self
    }

    pub fn with_entity(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.query_text.is_none() && self.entity_id.is_none()
    }
}

/// Effect of an alert toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertToggle {
    Created,
    Removed,
}

/// In-memory alert registry.
///
/// Real deployments keep alerts with the backend; this registry
/// implements the contract for tests and embedded use. Any non-empty
/// candidate counts as valid.
#[derive(Debug, Default)]
pub struct MemoryAlerts {
    entries: Mutex<BTreeSet<AlertCandidate>>,
}

impl MemoryAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl AlertRegistry for MemoryAlerts {
    fn check(&self, candidate: &AlertCandidate) -> bool {
        self.entries.lock().contains(candidate)
    }

    fn valid(&self, candidate: &AlertCandidate) -> bool {
        !candidate.is_empty()
    }

    fn toggle(&self, candidate: &AlertCandidate) -> Result<AlertToggle> {
        anyhow::ensure!(
            !candidate.is_empty(),
            "refusing to toggle an empty alert candidate"
        );
        let mut entries = self.entries.lock();
        if entries.remove(candidate) {
            Ok(AlertToggle::Removed)
        } else {
            entries.insert(candidate.clone());
            Ok(AlertToggle::Created)
        }
    }
}
