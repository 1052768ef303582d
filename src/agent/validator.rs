//! Turns a round's raw search results into scored evidence.
//!
//! For each result, in order:
//! 1. results without an `http(s)` URL are dropped;
//! 2. sources already accepted in an earlier round are reported as
//!    re-encountered and not scored again;
//! 3. relevance is the lexical overlap between the originating query's
//!    rationale and the result's title and snippet; results under the
//!    threshold are dropped;
//! 4. credibility comes from the domain allow/deny lists.
//!
//! Duplicates inside the round collapse onto the best-scoring copy.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::core::{Credibility, DomainPolicy, content_tokens, lexical_overlap, normalize_url};
use crate::search::{RoundResults, SearchResult};

/// A search result that passed validation. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedEvidence {
    /// The underlying result.
    pub result: SearchResult,
    /// Lexical relevance in `[0, 1]`.
    pub relevance_score: f32,
    /// Source credibility.
    pub credibility: Credibility,
}

impl ValidatedEvidence {
    /// Normalized source URL used for deduplication.
    #[must_use]
    pub fn key(&self) -> String {
        crate::core::source_key(&self.result.source_url)
    }
}

/// Output of validating one round.
#[derive(Debug, Clone, Default)]
pub struct Validation {
    /// New evidence, best first.
    pub accepted: Vec<ValidatedEvidence>,
    /// Normalized URLs of sources accepted in an earlier round that
    /// surfaced again, each listed once.
    pub reencountered: Vec<String>,
    /// Results dropped for relevance or an unusable URL.
    pub dropped: usize,
}

/// Scores and filters search results.
#[derive(Debug, Clone)]
pub struct ResultValidator {
    min_relevance: f32,
    policy: DomainPolicy,
}

struct Candidate {
    evidence: ValidatedEvidence,
    result_index: usize,
}

impl Candidate {
    /// Sort key: score descending, then round, query index, result index ascending.
    fn rank(&self, other: &Self) -> Ordering {
        other
            .evidence
            .relevance_score
            .total_cmp(&self.evidence.relevance_score)
            .then_with(|| self.evidence.result.query_id.cmp(&other.evidence.result.query_id))
            .then_with(|| self.result_index.cmp(&other.result_index))
    }
}

impl ResultValidator {
    /// Creates a validator.
    #[must_use]
    pub const fn new(min_relevance: f32, policy: DomainPolicy) -> Self {
        Self {
            min_relevance,
            policy,
        }
    }

    /// Validates one round of results.
    ///
    /// `seen` holds the normalized URLs of every source accepted in
    /// earlier rounds of the same loop.
    #[must_use]
    pub fn validate(&self, round: &RoundResults, seen: &HashSet<String>) -> Validation {
        let mut best: HashMap<String, Candidate> = HashMap::new();
        let mut reencountered = BTreeSet::new();
        let mut dropped = 0;

        for (query, results) in round.successes() {
            let mut reference = content_tokens(query.rationale());
            if reference.is_empty() {
                reference = content_tokens(query.text());
            }

            for (result_index, result) in results.iter().enumerate() {
                let Some(key) = normalize_url(&result.source_url) else {
                    debug!(url = %result.source_url, "dropping result without http(s) url");
                    dropped += 1;
                    continue;
                };

                if seen.contains(&key) {
                    reencountered.insert(key);
                    continue;
                }

                let candidate_tokens =
                    content_tokens(&format!("{} {}", result.title, result.snippet));
                let score = lexical_overlap(&reference, &candidate_tokens);
                if score < self.min_relevance {
                    debug!(
                        url = %result.source_url,
                        query = query.text(),
                        score,
                        "dropping low-relevance result"
                    );
                    dropped += 1;
                    continue;
                }

                let candidate = Candidate {
                    evidence: ValidatedEvidence {
                        credibility: self.policy.classify(&result.source_url),
                        relevance_score: score,
                        result: result.clone(),
                    },
                    result_index,
                };

                match best.get(&key) {
                    Some(existing) if candidate.rank(existing) != Ordering::Less => {}
                    _ => {
                        best.insert(key, candidate);
                    }
                }
            }
        }

        let mut ranked: Vec<Candidate> = best.into_values().collect();
        ranked.sort_by(Candidate::rank);

        debug!(
            accepted = ranked.len(),
            reencountered = reencountered.len(),
            dropped,
            "round validated"
        );

        Validation {
            accepted: ranked.into_iter().map(|c| c.evidence).collect(),
            reencountered: reencountered.into_iter().collect(),
            dropped,
        }
    }
}
