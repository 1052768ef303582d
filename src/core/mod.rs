//! Pure helpers shared by the review loop.
//!
//! Nothing in here performs I/O: URL and query normalization, lexical
//! relevance scoring, and domain credibility lookup.

pub mod credibility;
pub mod normalize;
pub mod relevance;

pub use credibility::{Credibility, DomainPolicy};
pub use normalize::{normalize_query_text, normalize_url, source_key};
pub use relevance::{content_tokens, lexical_overlap};
