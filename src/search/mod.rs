//! Web search capability for the review loop.
//!
//! A [`SearchProvider`] answers one query string with a list of hits. The
//! [`SearchExecutor`] fans a round of [`Query`] values out to the provider
//! concurrently, bounding parallelism, applying per-query timeouts and a
//! single retry, and reporting per-query failures as data.
//!
//! ```text
//! Vec<Query> → SearchExecutor
//!   ├── Semaphore(fan_out_limit)
//!   ├── task per query: timeout → retry once with backoff
//!   └── RoundResults (query order, success or failure marker per query)
//! ```

pub mod executor;
pub mod provider;
pub mod query;
pub mod tavily;

pub use executor::{ExecutorSettings, QueryOutcome, QueryReport, RoundResults, SearchExecutor};
pub use provider::{NoopSearchProvider, SearchHit, SearchProvider, SearchResult};
pub use query::{Query, QueryId};
pub use tavily::TavilyProvider;
