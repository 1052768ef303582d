//! Review loop state machine.
//!
//! ```text
//! Extracting → Searching → Validating → Deciding ─┬→ Extracting (next round)
//!      │                                          └→ Finalizing → Done
//!      └──────────── (no queries / search off) ─────→ Finalizing
//! ```
//!
//! [`LoopState`] is owned by the controller and changes only through
//! [`LoopState::transition`]. `round` never exceeds `max_rounds` and
//! `done` never goes back to `false`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::validator::ValidatedEvidence;
use crate::error::AgentError;
use crate::search::Query;

/// Controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Deriving queries.
    Extracting,
    /// Queries in flight.
    Searching,
    /// Scoring and citing results.
    Validating,
    /// Asking whether to refine.
    Deciding,
    /// Writing the answer.
    Finalizing,
    /// Terminal.
    Done,
}

impl Phase {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Extracting => "extracting",
            Self::Searching => "searching",
            Self::Validating => "validating",
            Self::Deciding => "deciding",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the loop stopped searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    /// The judge was satisfied.
    SufficientEvidence,
    /// The round budget is spent.
    MaxRounds,
    /// Nothing (new) to search for.
    NoNewQueries,
    /// Search was switched off for the turn.
    ModelDeclined,
}

impl TerminationReason {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SufficientEvidence => "sufficient-evidence",
            Self::MaxRounds => "max-rounds",
            Self::NoNewQueries => "no-new-queries",
            Self::ModelDeclined => "model-declined",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the Deciding phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Search again. Becomes [`TerminationReason::MaxRounds`] when the
    /// budget is spent.
    Refine,
    /// Stop searching.
    Stop(TerminationReason),
}

/// Inputs that drive the state machine.
#[derive(Debug, Clone)]
pub enum LoopEvent {
    /// Extraction finished. Empty means nothing to search.
    QueriesExtracted(Vec<Query>),
    /// Search is off for this turn.
    SearchDeclined,
    /// Every task of the round joined.
    SearchCompleted {
        /// Every query in the round failed.
        all_failed: bool,
    },
    /// Validation produced new evidence.
    Validated(Vec<ValidatedEvidence>),
    /// The sufficiency decision.
    Decided(Decision),
    /// The final answer has been written.
    AnswerWritten,
}

impl LoopEvent {
    const fn name(&self) -> &'static str {
        match self {
            Self::QueriesExtracted(_) => "queries-extracted",
            Self::SearchDeclined => "search-declined",
            Self::SearchCompleted { .. } => "search-completed",
            Self::Validated(_) => "validated",
            Self::Decided(_) => "decided",
            Self::AnswerWritten => "answer-written",
        }
    }
}

/// State of one loop invocation.
#[derive(Debug, Clone)]
pub struct LoopState {
    round: u32,
    max_rounds: u32,
    phase: Phase,
    queries: Vec<Query>,
    evidence: Vec<ValidatedEvidence>,
    evidence_keys: HashSet<String>,
    round_exhausted: bool,
    done: bool,
    termination_reason: Option<TerminationReason>,
}

impl LoopState {
    /// Starts at round 1 in [`Phase::Extracting`]. `max_rounds` is clamped to at least 1.
    #[must_use]
    pub fn new(max_rounds: u32) -> Self {
        Self {
            round: 1,
            max_rounds: max_rounds.max(1),
            phase: Phase::Extracting,
            queries: Vec::new(),
            evidence: Vec::new(),
            evidence_keys: HashSet::new(),
            round_exhausted: false,
            done: false,
            termination_reason: None,
        }
    }

    /// Current round (1-based).
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Round budget.
    #[must_use]
    pub const fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Every query issued, in issue order.
    #[must_use]
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Queries issued in the current round.
    #[must_use]
    pub fn current_queries(&self) -> &[Query] {
        let start = self
            .queries
            .iter()
            .position(|q| q.round() == self.round)
            .unwrap_or(self.queries.len());
        &self.queries[start..]
    }

    /// Accepted evidence, in acceptance order.
    #[must_use]
    pub fn evidence(&self) -> &[ValidatedEvidence] {
        &self.evidence
    }

    /// Normalized URLs of accepted evidence.
    #[must_use]
    pub const fn evidence_keys(&self) -> &HashSet<String> {
        &self.evidence_keys
    }

    /// Every query of the last searched round failed.
    #[must_use]
    pub const fn round_exhausted(&self) -> bool {
        self.round_exhausted
    }

    /// `true` once the loop reached [`Phase::Done`]. Never resets.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Why searching stopped, once known.
    #[must_use]
    pub const fn termination_reason(&self) -> Option<TerminationReason> {
        self.termination_reason
    }

    /// Hands the accepted evidence over by value.
    #[must_use]
    pub fn into_evidence(self) -> Vec<ValidatedEvidence> {
        self.evidence
    }

    /// Applies an event and returns the new phase.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Orchestration`] when the event is not valid
    /// in the current phase. The state is left unchanged.
    pub fn transition(&mut self, event: LoopEvent) -> Result<Phase, AgentError> {
        let from = self.phase;
        match (from, event) {
            (Phase::Extracting, LoopEvent::QueriesExtracted(queries)) => {
                if queries.is_empty() {
                    self.finalize(TerminationReason::NoNewQueries);
                } else {
                    self.queries.extend(queries);
                    self.phase = Phase::Searching;
                }
            }
            (Phase::Extracting, LoopEvent::SearchDeclined) => {
                self.finalize(TerminationReason::ModelDeclined);
            }
            (Phase::Searching, LoopEvent::SearchCompleted { all_failed }) => {
                self.round_exhausted = all_failed;
                self.phase = Phase::Validating;
            }
            (Phase::Validating, LoopEvent::Validated(accepted)) => {
                for item in accepted {
                    if self.evidence_keys.insert(item.key()) {
                        self.evidence.push(item);
                    }
                }
                self.phase = Phase::Deciding;
            }
            (Phase::Deciding, LoopEvent::Decided(decision)) => match decision {
                Decision::Refine if self.round < self.max_rounds => {
                    self.round += 1;
                    self.round_exhausted = false;
                    self.phase = Phase::Extracting;
                }
                Decision::Refine => self.finalize(TerminationReason::MaxRounds),
                Decision::Stop(reason) => self.finalize(reason),
            },
            (Phase::Finalizing, LoopEvent::AnswerWritten) => {
                self.phase = Phase::Done;
                self.done = true;
            }
            (phase, event) => {
                return Err(AgentError::Orchestration {
                    message: format!("invalid transition: {} in phase {phase}", event.name()),
                });
            }
        }
        debug!(round = self.round, from = %from, to = %self.phase, "loop transition");
        Ok(self.phase)
    }

    fn finalize(&mut self, reason: TerminationReason) {
        self.termination_reason = Some(reason);
        self.phase = Phase::Finalizing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn queries(round: u32, n: usize) -> Vec<Query> {
        (0..n)
            .map(|i| Query::new(format!("q{round}-{i}"), "r", round, i))
            .collect()
    }

    fn run_round(state: &mut LoopState, decision: Decision) -> Phase {
        let round = state.round();
        let steps = [
            LoopEvent::QueriesExtracted(queries(round, 2)),
            LoopEvent::SearchCompleted { all_failed: false },
            LoopEvent::Validated(Vec::new()),
            LoopEvent::Decided(decision),
        ];
        let mut phase = state.phase();
        for event in steps {
            phase = state.transition(event).unwrap_or_else(|_| unreachable!());
        }
        phase
    }

    #[test]
    fn test_single_round_sufficient() {
        let mut state = LoopState::new(3);
        let phase = run_round(&mut state, Decision::Stop(TerminationReason::SufficientEvidence));
        assert_eq!(phase, Phase::Finalizing);
        assert_eq!(state.round(), 1);
        assert!(!state.is_done());
        assert_eq!(
            state.transition(LoopEvent::AnswerWritten).ok(),
            Some(Phase::Done)
        );
        assert!(state.is_done());
        assert_eq!(
            state.termination_reason(),
            Some(TerminationReason::SufficientEvidence)
        );
    }

    #[test]
    fn test_refine_stops_at_max_rounds() {
        let mut state = LoopState::new(2);
        assert_eq!(run_round(&mut state, Decision::Refine), Phase::Extracting);
        assert_eq!(state.round(), 2);
        assert_eq!(state.current_queries().len(), 2);
        assert_eq!(run_round(&mut state, Decision::Refine), Phase::Finalizing);
        assert_eq!(state.round(), 2);
        assert_eq!(state.termination_reason(), Some(TerminationReason::MaxRounds));
        assert_eq!(state.queries().len(), 4);
    }

    #[test]
    fn test_empty_extraction_finalizes() {
        let mut state = LoopState::new(3);
        let phase = state
            .transition(LoopEvent::QueriesExtracted(Vec::new()))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(phase, Phase::Finalizing);
        assert_eq!(state.termination_reason(), Some(TerminationReason::NoNewQueries));
    }

    #[test]
    fn test_search_declined() {
        let mut state = LoopState::new(3);
        let _ = state.transition(LoopEvent::SearchDeclined);
        assert_eq!(state.termination_reason(), Some(TerminationReason::ModelDeclined));
    }

    #[test]
    fn test_invalid_transition_leaves_state() {
        let mut state = LoopState::new(3);
        let err = state.transition(LoopEvent::AnswerWritten);
        assert!(matches!(err, Err(AgentError::Orchestration { .. })));
        assert_eq!(state.phase(), Phase::Extracting);
    }

    #[test]
    fn test_done_is_terminal() {
        let mut state = LoopState::new(3);
        state.transition(LoopEvent::QueriesExtracted(Vec::new())).unwrap();
        state.transition(LoopEvent::AnswerWritten).unwrap();
        assert!(state.is_done());
        assert!(state.transition(LoopEvent::QueriesExtracted(queries(1, 1))).is_err());
        assert!(state.is_done());
        assert_eq!(state.phase(), Phase::Done);
        assert_eq!(state.termination_reason(), Some(TerminationReason::NoNewQueries));
    }

    #[test]
    fn test_reason_serialization() {
        let json = serde_json::to_string(&TerminationReason::NoNewQueries).unwrap_or_default();
        assert_eq!(json, "\"no-new-queries\"");
        assert_eq!(TerminationReason::MaxRounds.to_string(), "max-rounds");
    }

    proptest! {
        #[test]
        fn prop_round_bounded_and_monotonic(
            max_rounds in 1u32..6,
            decisions in prop::collection::vec(any::<bool>(), 1..10),
        ) {
            let mut state = LoopState::new(max_rounds);
            let mut last_round = state.round();
            for refine in decisions {
                if state.phase() != Phase::Extracting {
                    break;
                }
                let decision = if refine {
                    Decision::Refine
                } else {
                    Decision::Stop(TerminationReason::SufficientEvidence)
                };
                run_round(&mut state, decision);
                prop_assert!(state.round() <= max_rounds);
                prop_assert!(state.round() == last_round || state.round() == last_round + 1);
                last_round = state.round();
            }
            prop_assert!(state.round() <= max_rounds);
        }
    }
}
