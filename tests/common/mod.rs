//! Common test utilities for integration tests.
//!
//! [`ScriptedLlm`] answers by model name: the test config names the
//! extractor, judge and reviewer models after their roles so one provider
//! can play all three. [`ScriptedSearch`] answers by query text.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use devil_rs::agent::{
    AgentConfig, ChatRequest, ChatResponse, LlmProvider, PromptSet, ReActController,
    ReviewEvent, ReviewOutcome, ReviewRequest, StreamEmitter, TextStream,
};
use devil_rs::error::{AgentError, ProviderError};
use devil_rs::search::{SearchHit, SearchProvider};

pub const EXTRACTOR: &str = "extractor";
pub const JUDGE: &str = "judge";
pub const REVIEWER: &str = "reviewer";

/// Language model scripted per role.
#[derive(Default)]
pub struct ScriptedLlm {
    extractor: Mutex<VecDeque<String>>,
    judge: Mutex<VecDeque<String>>,
    answer: Vec<String>,
    failing: HashSet<String>,
    calls: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            answer: vec!["Review".to_string(), " body.".to_string()],
            ..Self::default()
        }
    }

    /// Extractor responses, one per call. The last one repeats.
    pub fn extractor(mut self, responses: &[&str]) -> Self {
        self.extractor = Mutex::new(responses.iter().map(ToString::to_string).collect());
        self
    }

    /// Judge responses, one per call. The last one repeats.
    pub fn judge(mut self, responses: &[&str]) -> Self {
        self.judge = Mutex::new(responses.iter().map(ToString::to_string).collect());
        self
    }

    /// Chunks streamed by the reviewer.
    pub fn answer(mut self, chunks: &[&str]) -> Self {
        self.answer = chunks.iter().map(ToString::to_string).collect();
        self
    }

    /// Every call to `model` fails.
    pub fn failing(mut self, model: &str) -> Self {
        self.failing.insert(model.to_string());
        self
    }

    /// Number of calls made to `model`.
    pub fn calls_to(&self, model: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.model == model)
            .count()
    }

    /// User messages sent to `model`, in order.
    pub fn prompts_to(&self, model: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.model == model)
            .filter_map(|r| r.last_user_content().map(str::to_string))
            .collect()
    }

    fn next(queue: &Mutex<VecDeque<String>>) -> String {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_else(|| "{}".to_string())
        }
    }

    fn record(&self, request: &ChatRequest) -> Result<(), AgentError> {
        self.calls.lock().unwrap().push(request.clone());
        if self.failing.contains(&request.model) {
            return Err(AgentError::ApiRequest {
                message: format!("{} unreachable", request.model),
                status: Some(503),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        self.record(request)?;
        let content = match request.model.as_str() {
            EXTRACTOR => Self::next(&self.extractor),
            JUDGE => Self::next(&self.judge),
            other => {
                return Err(AgentError::ApiRequest {
                    message: format!("unexpected non-streaming call to {other}"),
                    status: None,
                });
            }
        };
        Ok(ChatResponse {
            content,
            ..ChatResponse::default()
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<TextStream, AgentError> {
        self.record(request)?;
        let chunks: Vec<Result<String, AgentError>> = self.answer.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }
}

enum Scripted {
    Hits(Vec<SearchHit>),
    Fail(ProviderError),
    Hang,
}

/// Search provider scripted per query text.
///
/// Unscripted queries return one hit at `https://example.org/<slug>`
/// titled after the query.
#[derive(Default)]
pub struct ScriptedSearch {
    scripted: HashMap<String, Scripted>,
    fail_all: bool,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.scripted.insert(query.to_string(), Scripted::Hits(hits));
        self
    }

    pub fn fail(mut self, query: &str, error: ProviderError) -> Self {
        self.scripted.insert(query.to_string(), Scripted::Fail(error));
        self
    }

    /// The query never answers.
    pub fn hang(mut self, query: &str) -> Self {
        self.scripted.insert(query.to_string(), Scripted::Hang);
        self
    }

    pub fn fail_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub fn hit(url: &str, title: &str, snippet: &str) -> SearchHit {
    SearchHit::new(url, title, snippet)
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = if self.fail_all {
            Err(ProviderError::Network {
                message: "offline".to_string(),
            })
        } else {
            match self.scripted.get(query) {
                Some(Scripted::Hits(hits)) => Ok(hits.clone()),
                Some(Scripted::Fail(error)) => Err(error.clone()),
                Some(Scripted::Hang) => std::future::pending().await,
                None => {
                    let slug = query.to_lowercase().replace(' ', "-");
                    Ok(vec![hit(
                        &format!("https://example.org/{slug}"),
                        query,
                        &format!("About {query}."),
                    )])
                }
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Test configuration: role-named models, no relevance floor, fast retries.
pub fn config() -> devil_rs::agent::config::AgentConfigBuilder {
    AgentConfig::builder()
        .api_key("test-key")
        .extractor_model(EXTRACTOR)
        .judge_model(JUDGE)
        .reviewer_model(REVIEWER)
        .search_provider("none")
        .min_relevance(0.0)
        .retry_backoff(Duration::from_millis(10))
        .query_timeout(Duration::from_secs(2))
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

pub fn controller(
    config: AgentConfig,
    llm: &Arc<ScriptedLlm>,
    search: &Arc<ScriptedSearch>,
) -> ReActController {
    let llm: Arc<dyn LlmProvider> = llm.clone();
    let search: Arc<dyn SearchProvider> = search.clone();
    ReActController::new(config, PromptSet::defaults(), llm, search).with_today(today())
}

/// Runs one turn to completion and returns its result and every event.
pub async fn run(
    controller: &ReActController,
    request: ReviewRequest,
) -> (Result<ReviewOutcome, AgentError>, Vec<ReviewEvent>) {
    let (mut emitter, mut rx) = StreamEmitter::channel(1024, 1);
    let result = controller
        .run(&request, &mut emitter, &CancellationToken::new())
        .await;
    drop(emitter);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (result, events)
}

/// `{"queries": [...]}` with each text as its own rationale.
pub fn queries_json(texts: &[&str]) -> String {
    let items: Vec<serde_json::Value> = texts
        .iter()
        .map(|t| serde_json::json!({ "text": t, "rationale": t }))
        .collect();
    serde_json::json!({ "queries": items }).to_string()
}

pub const SUFFICIENT: &str = r#"{"sufficient": true, "reason": "covered", "gaps": [], "new_queries": []}"#;

pub fn insufficient(new_queries: &[&str]) -> String {
    serde_json::json!({
        "sufficient": false,
        "reason": "more needed",
        "gaps": ["unresolved claim"],
        "new_queries": new_queries,
    })
    .to_string()
}
