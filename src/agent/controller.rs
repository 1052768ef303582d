//! The review loop controller.
//!
//! Drives Extract → Search → Validate → Decide rounds over a
//! [`LoopState`], then streams the final answer with its references.
//! One controller can serve many turns; each call to
//! [`ReActController::run`] is one independent turn.

use std::future::Future;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::citation::{Citation, CitationAggregator};
use super::client::{create_provider, create_search_provider};
use super::config::AgentConfig;
use super::extractor::{ExtractorAgent, QueryExtractor};
use super::judge::{JudgeAgent, JudgeInput, ModelJudge, SufficiencyJudge, Verdict};
use super::prompt::{PromptSet, build_reviewer_prompt};
use super::provider::LlmProvider;
use super::reviewer::ReviewerAgent;
use super::skill::{ReviewMode, Skill};
use super::state::{Decision, LoopEvent, LoopState, Phase, TerminationReason};
use super::stream::{OFFLINE_NOTICE, ReviewEvent, StreamEmitter, references_footer};
use super::traits::Agent;
use super::validator::ResultValidator;
use crate::error::AgentError;
use crate::search::{RoundResults, SearchExecutor, SearchProvider};

/// Channel capacity used by [`spawn_review`].
const EVENT_BUFFER: usize = 64;

/// One user turn.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    /// Content to review.
    pub content: String,
    /// Reviewer persona.
    pub mode: ReviewMode,
    /// Whether web search is allowed this turn.
    pub search_enabled: bool,
}

impl ReviewRequest {
    /// A devil-mode request with search on.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            mode: ReviewMode::default(),
            search_enabled: true,
        }
    }

    /// Sets the review mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: ReviewMode) -> Self {
        self.mode = mode;
        self
    }

    /// Turns web search on or off.
    #[must_use]
    pub const fn with_search(mut self, enabled: bool) -> Self {
        self.search_enabled = enabled;
        self
    }
}

/// Result of a completed turn.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    /// Full answer text, references included.
    pub answer: String,
    /// Citations in ID order.
    pub citations: Vec<Citation>,
    /// Why searching stopped.
    pub termination_reason: TerminationReason,
    /// Rounds run.
    pub rounds: u32,
    /// Skill the content was classified as.
    pub skill: Skill,
}

/// Drives the agentic retrieval loop for one turn at a time.
pub struct ReActController {
    config: AgentConfig,
    prompts: PromptSet,
    llm: Arc<dyn LlmProvider>,
    extractor: QueryExtractor,
    executor: SearchExecutor,
    validator: ResultValidator,
    judge: Arc<dyn SufficiencyJudge>,
    today: Option<NaiveDate>,
}

impl ReActController {
    /// Creates a controller using [`ModelJudge`] for sufficiency.
    #[must_use]
    pub fn new(
        config: AgentConfig,
        prompts: PromptSet,
        llm: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchProvider>,
    ) -> Self {
        let extractor = QueryExtractor::new(
            ExtractorAgent::new(&config, prompts.extractor.clone()),
            config.max_queries_per_round,
        );
        let judge = ModelJudge::new(
            JudgeAgent::new(&config, prompts.judge.clone()),
            Arc::clone(&llm),
        );
        Self {
            executor: SearchExecutor::new(search, config.executor_settings()),
            validator: ResultValidator::new(config.min_relevance, config.domain_policy()),
            judge: Arc::new(judge),
            extractor,
            llm,
            prompts,
            config,
            today: None,
        }
    }

    /// Builds providers from the configuration and loads prompts from
    /// [`AgentConfig::prompt_dir`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if either provider cannot be created.
    pub fn from_config(config: AgentConfig) -> Result<Self, AgentError> {
        let llm: Arc<dyn LlmProvider> = Arc::from(create_provider(&config)?);
        let search: Arc<dyn SearchProvider> = Arc::from(create_search_provider(&config)?);
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Ok(Self::new(config, prompts, llm, search))
    }

    /// Replaces the sufficiency judge.
    #[must_use]
    pub fn with_judge(mut self, judge: Arc<dyn SufficiencyJudge>) -> Self {
        self.judge = judge;
        self
    }

    /// Pins the date given to the models instead of today's UTC date.
    #[must_use]
    pub const fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Loop configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Runs one turn, reporting progress through `emitter`.
    ///
    /// On success the last event is `final`. On failure, including
    /// cancellation, exactly one `error` event is sent instead.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Cancelled`] if `cancel` fires or the event
    /// receiver goes away, and any model failure as-is. Search failures
    /// are never returned.
    pub async fn run(
        &self,
        request: &ReviewRequest,
        emitter: &mut StreamEmitter,
        cancel: &CancellationToken,
    ) -> Result<ReviewOutcome, AgentError> {
        let result = self.drive(request, emitter, cancel).await;
        match &result {
            Ok(outcome) => info!(
                rounds = outcome.rounds,
                citations = outcome.citations.len(),
                reason = %outcome.termination_reason,
                "review finished"
            ),
            Err(e) => {
                warn!(error = %e, "review failed");
                emitter.fail(e.to_string()).await;
            }
        }
        result
    }

    #[allow(clippy::too_many_lines)]
    async fn drive(
        &self,
        request: &ReviewRequest,
        emitter: &mut StreamEmitter,
        cancel: &CancellationToken,
    ) -> Result<ReviewOutcome, AgentError> {
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        let skill = Skill::classify(&request.content);
        let mut state = LoopState::new(self.config.max_rounds);
        let mut citations = CitationAggregator::new();
        let mut refinement: Option<Verdict> = None;
        let mut pending: Option<RoundResults> = None;
        let mut answer = String::new();

        info!(
            mode = %request.mode,
            skill = %skill,
            search = request.search_enabled,
            max_rounds = state.max_rounds(),
            "review started"
        );

        loop {
            ensure_live(cancel)?;
            let round = state.round();

            match state.phase() {
                Phase::Extracting => {
                    if !request.search_enabled {
                        emitter.status(round, Phase::Extracting, "web search off").await?;
                        state.transition(LoopEvent::SearchDeclined)?;
                        continue;
                    }

                    emitter
                        .status(round, Phase::Extracting, "extracting search queries")
                        .await?;
                    let queries = until_cancelled(
                        cancel,
                        self.extractor.extract(
                            self.llm.as_ref(),
                            &request.content,
                            round,
                            refinement.as_ref(),
                            state.queries(),
                            today,
                        ),
                    )
                    .await?;
                    if queries.is_empty() {
                        info!(round, "no new queries");
                    }
                    state.transition(LoopEvent::QueriesExtracted(queries))?;
                }

                Phase::Searching => {
                    let queries = state.current_queries().to_vec();
                    let listed: Vec<&str> = queries.iter().map(|q| q.text()).collect();
                    emitter
                        .status(round, Phase::Searching, format!("searching: {}", listed.join(" | ")))
                        .await?;

                    let results = self.executor.execute(&queries, cancel).await?;
                    let all_failed = results.all_failed();
                    if results.failed_count() > 0 {
                        warn!(
                            round,
                            failed = results.failed_count(),
                            total = queries.len(),
                            errors = ?results.failure_messages(),
                            "search queries failed"
                        );
                    }
                    state.transition(LoopEvent::SearchCompleted { all_failed })?;
                    pending = Some(results);
                }

                Phase::Validating => {
                    let results = pending.take().unwrap_or_default();
                    emitter
                        .status(
                            round,
                            Phase::Validating,
                            format!("validating {} results", results.result_count()),
                        )
                        .await?;

                    let validation = self.validator.validate(&results, state.evidence_keys());
                    for key in &validation.reencountered {
                        citations.touch(key);
                    }
                    let added = citations.merge(validation.accepted.iter().cloned());
                    debug!(
                        round,
                        accepted = added.len(),
                        reencountered = validation.reencountered.len(),
                        dropped = validation.dropped,
                        "round validated"
                    );
                    for citation in &added {
                        ensure_live(cancel)?;
                        emitter.citation_added(citation).await?;
                    }
                    state.transition(LoopEvent::Validated(validation.accepted))?;
                }

                Phase::Deciding => {
                    let decision = if state.round_exhausted() {
                        emitter
                            .status(round, Phase::Deciding, "every search failed; answering with what we have")
                            .await?;
                        Decision::Stop(TerminationReason::MaxRounds)
                    } else {
                        emitter
                            .status(round, Phase::Deciding, "checking whether evidence is sufficient")
                            .await?;
                        let verdict = self
                            .judge_round(request, &state, &citations, today, cancel)
                            .await?;
                        if verdict.sufficient {
                            Decision::Stop(TerminationReason::SufficientEvidence)
                        } else {
                            refinement = Some(verdict);
                            Decision::Refine
                        }
                    };
                    state.transition(LoopEvent::Decided(decision))?;
                }

                Phase::Finalizing => {
                    answer = self
                        .write_answer(request, skill, &state, &citations, today, emitter, cancel)
                        .await?;
                    state.transition(LoopEvent::AnswerWritten)?;
                }

                Phase::Done => break,
            }
        }

        let termination_reason = state
            .termination_reason()
            .unwrap_or(TerminationReason::NoNewQueries);
        let rounds = state.round();
        let citations = citations.into_citations();

        emitter
            .finish(answer.clone(), citations.clone(), termination_reason, rounds)
            .await?;

        Ok(ReviewOutcome {
            answer,
            citations,
            termination_reason,
            rounds,
            skill,
        })
    }

    /// Asks the judge and applies the citation floor.
    async fn judge_round(
        &self,
        request: &ReviewRequest,
        state: &LoopState,
        citations: &CitationAggregator,
        today: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<Verdict, AgentError> {
        let searched: Vec<String> = state.queries().iter().map(|q| q.text().to_string()).collect();
        let cited: Vec<&Citation> = citations.ordered().collect();
        let input = JudgeInput {
            content: &request.content,
            round: state.round(),
            max_rounds: state.max_rounds(),
            searched: &searched,
            citations: &cited,
            today,
        };
        let verdict = until_cancelled(cancel, self.judge.judge(&input)).await?;

        let floor = self.config.min_citations_for_sufficiency;
        if verdict.sufficient && citations.len() < floor {
            info!(
                round = state.round(),
                citations = citations.len(),
                floor,
                "sufficient verdict overruled by citation floor"
            );
            let gap = if verdict.reason.is_empty() {
                "independent sources corroborating the main claims".to_string()
            } else {
                verdict.reason
            };
            return Ok(Verdict::insufficient(
                format!("only {} of {floor} required sources", citations.len()),
                vec![gap],
                Vec::new(),
            ));
        }

        Ok(verdict)
    }

    /// Streams the reviewer's answer followed by references or the
    /// offline notice. Returns the full text.
    #[allow(clippy::too_many_arguments)]
    async fn write_answer(
        &self,
        request: &ReviewRequest,
        skill: Skill,
        state: &LoopState,
        citations: &CitationAggregator,
        today: NaiveDate,
        emitter: &mut StreamEmitter,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let message = if request.search_enabled {
            format!("writing answer with {} sources", citations.len())
        } else {
            "writing answer (offline)".to_string()
        };
        emitter.status(state.round(), Phase::Finalizing, message).await?;

        let cited: Vec<Citation> = citations.ordered().cloned().collect();
        let prompt = build_reviewer_prompt(&request.content, today, &cited, request.search_enabled);
        let reviewer = ReviewerAgent::new(&self.config, self.prompts.reviewer(request.mode, skill));

        let mut stream = until_cancelled(cancel, reviewer.execute_stream(self.llm.as_ref(), &prompt)).await?;
        let mut answer = String::new();

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AgentError::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk?;
            answer.push_str(&chunk);
            emitter.partial(&chunk).await?;
        }

        let footer = if request.search_enabled {
            references_footer(&cited)
        } else {
            OFFLINE_NOTICE.to_string()
        };
        answer.push_str(&footer);
        emitter.partial(&footer).await?;
        emitter.flush().await?;

        Ok(answer)
    }
}

impl std::fmt::Debug for ReActController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReActController")
            .field("llm", &self.llm.name())
            .field("executor", &self.executor)
            .field("max_rounds", &self.config.max_rounds)
            .finish_non_exhaustive()
    }
}

/// A turn running on its own task.
#[derive(Debug)]
pub struct ReviewHandle {
    /// Events in emission order.
    pub events: ReceiverStream<ReviewEvent>,
    /// Cancels the turn. Dropping `events` has the same effect.
    pub cancel: CancellationToken,
    /// Resolves to the turn's outcome.
    pub task: JoinHandle<Result<ReviewOutcome, AgentError>>,
}

/// Runs a turn on a new task and returns its event stream.
///
/// Dropping the event stream cancels the turn, including any search
/// round in flight.
#[must_use]
pub fn spawn_review(controller: Arc<ReActController>, request: ReviewRequest) -> ReviewHandle {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let disconnected = tx.clone();
    let mut emitter = StreamEmitter::new(tx, controller.config().stream_flush_bytes);
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let run = controller.run(&request, &mut emitter, &token);
        tokio::pin!(run);
        let result = tokio::select! {
            result = &mut run => result,
            () = disconnected.closed() => {
                debug!("event receiver dropped, cancelling review");
                token.cancel();
                run.await
            }
        };
        if result.is_err() {
            token.cancel();
        }
        result
    });

    ReviewHandle {
        events: ReceiverStream::new(rx),
        cancel,
        task,
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), AgentError> {
    if cancel.is_cancelled() {
        return Err(AgentError::Cancelled);
    }
    Ok(())
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T, AgentError>>,
) -> Result<T, AgentError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AgentError::Cancelled),
        result = work => result,
    }
}
