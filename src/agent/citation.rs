//! Stable citation numbering across rounds.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::validator::ValidatedEvidence;
use crate::core::source_key;

/// A numbered reference to a source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    /// Assigned once, never reused within a loop invocation. Starts at 1.
    pub id: u32,
    /// Evidence as first accepted.
    pub evidence: ValidatedEvidence,
    /// Times the source was surfaced, including the first.
    pub usage_count: u32,
}

impl Citation {
    /// Source URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.evidence.result.source_url
    }

    /// Source title, falling back to the URL.
    #[must_use]
    pub fn title(&self) -> &str {
        let title = self.evidence.result.title.trim();
        if title.is_empty() { self.url() } else { title }
    }
}

/// Owns the citation set of one loop invocation.
#[derive(Debug, Clone)]
pub struct CitationAggregator {
    by_id: BTreeMap<u32, Citation>,
    by_key: HashMap<String, u32>,
    next_id: u32,
}

impl Default for CitationAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl CitationAggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_id: BTreeMap::new(),
            by_key: HashMap::new(),
            next_id: 1,
        }
    }

    /// Merges evidence in the order given.
    ///
    /// Evidence whose normalized URL is new gets the next ID; anything
    /// else only bumps the existing citation's usage count. Returns the
    /// citations created by this call, in ID order.
    pub fn merge(&mut self, evidence: impl IntoIterator<Item = ValidatedEvidence>) -> Vec<Citation> {
        let mut added = Vec::new();
        for item in evidence {
            let key = item.key();
            if self.touch(&key) {
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            let citation = Citation {
                id,
                evidence: item,
                usage_count: 1,
            };
            self.by_key.insert(key, id);
            self.by_id.insert(id, citation.clone());
            added.push(citation);
        }
        added
    }

    /// Increments the usage count of the citation for `url`.
    ///
    /// Accepts raw or normalized URLs. Returns `false` when no citation
    /// exists for it.
    pub fn touch(&mut self, url: &str) -> bool {
        let Some(id) = self.id_for(url) else {
            return false;
        };
        if let Some(citation) = self.by_id.get_mut(&id) {
            citation.usage_count += 1;
        }
        true
    }

    /// Citation ID for a URL, if it was cited.
    #[must_use]
    pub fn id_for(&self, url: &str) -> Option<u32> {
        self.by_key
            .get(url)
            .or_else(|| self.by_key.get(&source_key(url)))
            .copied()
    }

    /// Looks up a citation by ID.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&Citation> {
        self.by_id.get(&id)
    }

    /// Citations in ascending ID order.
    pub fn ordered(&self) -> impl Iterator<Item = &Citation> {
        self.by_id.values()
    }

    /// Number of citations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns `true` when nothing has been cited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Consumes the aggregator, yielding citations in ID order.
    #[must_use]
    pub fn into_citations(self) -> Vec<Citation> {
        self.by_id.into_values().collect()
    }
}
