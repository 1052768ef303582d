//! Concurrent fan-out of a round's queries.
//!
//! Every query runs as its own task holding a semaphore permit, so at most
//! `fan_out_limit` provider calls are in flight at once and the rest queue.
//! Each task owns its result slot; slots are merged into [`RoundResults`]
//! in query order once every task has joined, never in completion order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::provider::{SearchProvider, SearchResult};
use super::query::{Query, QueryId};
use crate::error::{AgentError, ProviderError};

/// A failed query is retried once: two attempts in total.
const MAX_ATTEMPTS: u32 = 2;

/// Tuning for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Maximum simultaneous provider calls.
    pub fan_out_limit: usize,
    /// Deadline for a single provider call.
    pub per_query_timeout: Duration,
    /// Base delay before the retry; doubled per attempt.
    pub retry_backoff: Duration,
    /// Hits kept per query.
    pub max_results: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            fan_out_limit: 5,
            per_query_timeout: Duration::from_secs(8),
            retry_backoff: Duration::from_millis(500),
            max_results: 5,
        }
    }
}

/// What happened to one query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The provider answered (possibly with zero hits).
    Succeeded {
        /// Stamped results, in provider order.
        results: Vec<SearchResult>,
        /// Attempts used (1 or 2).
        attempts: u32,
    },
    /// Every attempt failed. This is a marker, not a fault.
    Failed {
        /// Error from the last attempt.
        error: ProviderError,
        /// Attempts used.
        attempts: u32,
    },
}

impl QueryOutcome {
    /// Returns `true` for [`QueryOutcome::Failed`].
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Outcome for one query plus timing.
#[derive(Debug, Clone)]
pub struct QueryReport {
    /// The query as issued.
    pub query: Query,
    /// Success with results, or failure marker.
    pub outcome: QueryOutcome,
    /// Wall time including retry backoff.
    pub elapsed: Duration,
}

/// All query outcomes for one round, in the order the queries were issued.
#[derive(Debug, Clone, Default)]
pub struct RoundResults {
    /// One report per submitted query.
    pub reports: Vec<QueryReport>,
}

impl RoundResults {
    /// Looks up the outcome for a query.
    #[must_use]
    pub fn get(&self, id: QueryId) -> Option<&QueryOutcome> {
        self.reports
            .iter()
            .find(|r| r.query.id() == id)
            .map(|r| &r.outcome)
    }

    /// `true` when queries were submitted and every one of them failed.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        !self.reports.is_empty() && self.reports.iter().all(|r| r.outcome.is_failed())
    }

    /// Number of failed queries.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_failed()).count()
    }

    /// Total results across successful queries.
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.successes().map(|(_, results)| results.len()).sum()
    }

    /// Successful queries with their results, in query order.
    pub fn successes(&self) -> impl Iterator<Item = (&Query, &[SearchResult])> {
        self.reports.iter().filter_map(|r| match &r.outcome {
            QueryOutcome::Succeeded { results, .. } => Some((&r.query, results.as_slice())),
            QueryOutcome::Failed { .. } => None,
        })
    }

    /// Human-readable failure lines (`"query: error"`).
    #[must_use]
    pub fn failure_messages(&self) -> Vec<String> {
        self.reports
            .iter()
            .filter_map(|r| match &r.outcome {
                QueryOutcome::Failed { error, attempts } => Some(format!(
                    "{} ({attempts} attempts): {error}",
                    r.query.text()
                )),
                QueryOutcome::Succeeded { .. } => None,
            })
            .collect()
    }
}

/// Runs a round of queries against a search provider.
pub struct SearchExecutor {
    provider: Arc<dyn SearchProvider>,
    settings: ExecutorSettings,
}

impl SearchExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(provider: Arc<dyn SearchProvider>, settings: ExecutorSettings) -> Self {
        Self { provider, settings }
    }

    /// Executor settings.
    #[must_use]
    pub const fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Executes all `queries` concurrently, bounded by the fan-out limit.
    ///
    /// Individual query failures are reported in the returned
    /// [`RoundResults`]; they never fail the call.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Cancelled`] if `cancel` fires before every
    /// task has joined. In-flight tasks are aborted and anything they
    /// would have produced is discarded.
    pub async fn execute(
        &self,
        queries: &[Query],
        cancel: &CancellationToken,
    ) -> Result<RoundResults, AgentError> {
        if queries.is_empty() {
            return Ok(RoundResults::default());
        }

        let semaphore = Arc::new(Semaphore::new(self.settings.fan_out_limit.max(1)));
        let mut tasks = JoinSet::new();
        let mut task_slots = HashMap::with_capacity(queries.len());

        for (slot, query) in queries.iter().cloned().enumerate() {
            let sem = Arc::clone(&semaphore);
            let provider = Arc::clone(&self.provider);
            let settings = self.settings.clone();

            let handle = tasks.spawn(async move {
                let report = match sem.acquire_owned().await {
                    Ok(_permit) => run_query(&*provider, query, &settings).await,
                    Err(e) => QueryReport {
                        query,
                        outcome: QueryOutcome::Failed {
                            error: ProviderError::Network {
                                message: format!("semaphore closed: {e}"),
                            },
                            attempts: 0,
                        },
                        elapsed: Duration::ZERO,
                    },
                };
                (slot, report)
            });
            task_slots.insert(handle.id(), slot);
        }

        let mut slots: Vec<Option<QueryReport>> = vec![None; queries.len()];

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tasks.abort_all();
                    debug!(in_flight = tasks.len(), "search round cancelled");
                    return Err(AgentError::Cancelled);
                }
                joined = tasks.join_next_with_id() => match joined {
                    None => break,
                    Some(Ok((_, (slot, report)))) => slots[slot] = Some(report),
                    Some(Err(e)) => {
                        // A panicked task still owns exactly one slot.
                        if let Some(&slot) = task_slots.get(&e.id()) {
                            slots[slot] = Some(QueryReport {
                                query: queries[slot].clone(),
                                outcome: QueryOutcome::Failed {
                                    error: ProviderError::Network {
                                        message: format!("search task failed: {e}"),
                                    },
                                    attempts: 0,
                                },
                                elapsed: Duration::ZERO,
                            });
                        }
                    }
                },
            }
        }

        let reports: Vec<QueryReport> = slots.into_iter().flatten().collect();
        debug_assert_eq!(reports.len(), queries.len(), "search slot count mismatch");

        Ok(RoundResults { reports })
    }
}

impl std::fmt::Debug for SearchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchExecutor")
            .field("provider", &self.provider.name())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Runs one query with timeout and a single retry.
async fn run_query(
    provider: &dyn SearchProvider,
    query: Query,
    settings: &ExecutorSettings,
) -> QueryReport {
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = match tokio::time::timeout(
            settings.per_query_timeout,
            provider.search(query.text(), settings.max_results),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                after: settings.per_query_timeout,
            }),
        };

        match result {
            Ok(hits) => {
                let fetched_at = Utc::now();
                let results: Vec<SearchResult> = hits
                    .into_iter()
                    .take(settings.max_results)
                    .map(|hit| SearchResult::from_hit(hit, query.id(), fetched_at))
                    .collect();
                debug!(
                    query = query.text(),
                    attempt,
                    results = results.len(),
                    "search query succeeded"
                );
                return QueryReport {
                    query,
                    outcome: QueryOutcome::Succeeded {
                        results,
                        attempts: attempt,
                    },
                    elapsed: start.elapsed(),
                };
            }
            Err(error) if attempt < MAX_ATTEMPTS => {
                let Some(delay) = backoff_delay(
                    settings.retry_backoff,
                    attempt,
                    &error,
                    settings.per_query_timeout,
                ) else {
                    warn!(
                        query = query.text(),
                        attempt,
                        %error,
                        "retry-after exceeds query timeout, not retrying"
                    );
                    return QueryReport {
                        query,
                        outcome: QueryOutcome::Failed {
                            error,
                            attempts: attempt,
                        },
                        elapsed: start.elapsed(),
                    };
                };
                warn!(
                    query = query.text(),
                    attempt,
                    %error,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "search query failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => {
                warn!(query = query.text(), attempt, %error, "search query failed");
                return QueryReport {
                    query,
                    outcome: QueryOutcome::Failed {
                        error,
                        attempts: attempt,
                    },
                    elapsed: start.elapsed(),
                };
            }
        }
    }
}

/// Exponential backoff, stretched to honor a provider's `Retry-After`.
///
/// Never longer than `limit`. Returns `None` when the provider asks for a
/// wait beyond `limit`; such a query fails instead of stalling the round.
fn backoff_delay(
    base: Duration,
    attempt: u32,
    error: &ProviderError,
    limit: Duration,
) -> Option<Duration> {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
    match error {
        ProviderError::RateLimited {
            retry_after: Some(wait),
        } if *wait > limit => None,
        ProviderError::RateLimited {
            retry_after: Some(wait),
        } => Some(exponential.max(*wait).min(limit)),
        _ => Some(exponential.min(limit)),
    }
}
