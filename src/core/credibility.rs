//! Domain credibility classification.
//!
//! A static allow/deny list decides whether a source is `trusted`,
//! `flagged`, or `unknown`. Entries match the host exactly or any of its
//! subdomains; entries starting with `.` match a suffix (`.gov`).

use serde::{Deserialize, Serialize};

use super::normalize::host_of;

/// Built-in trusted domains.
pub const DEFAULT_TRUSTED_DOMAINS: &[&str] = &[
    ".gov",
    ".edu",
    ".mil",
    "wikipedia.org",
    "arxiv.org",
    "nature.com",
    "science.org",
    "acm.org",
    "ieee.org",
    "nih.gov",
    "who.int",
    "europa.eu",
    "reuters.com",
    "apnews.com",
    "bbc.co.uk",
    "github.com",
    "docs.rs",
    "rust-lang.org",
    "python.org",
    "developer.mozilla.org",
    "stackoverflow.com",
];

/// Built-in flagged domains (content farms, link shorteners, paste sites).
pub const DEFAULT_FLAGGED_DOMAINS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "pastebin.com",
    "answers.com",
    "ehow.com",
    "quora.com",
];

/// Credibility classification of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Credibility {
    /// Listed as trustworthy.
    Trusted,
    /// Not on either list.
    Unknown,
    /// Listed as unreliable. Still citable, but marked as unverified.
    Flagged,
}

impl Credibility {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trusted => "trusted",
            Self::Unknown => "unknown",
            Self::Flagged => "flagged",
        }
    }
}

impl std::fmt::Display for Credibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allow/deny lists used to classify sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPolicy {
    trusted: Vec<String>,
    flagged: Vec<String>,
}

impl Default for DomainPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TRUSTED_DOMAINS, DEFAULT_FLAGGED_DOMAINS)
    }
}

impl DomainPolicy {
    /// Creates a policy from explicit lists.
    #[must_use]
    pub fn new<S: AsRef<str>>(trusted: &[S], flagged: &[S]) -> Self {
        let clean = |list: &[S]| -> Vec<String> {
            list.iter()
                .map(|d| d.as_ref().trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect()
        };
        Self {
            trusted: clean(trusted),
            flagged: clean(flagged),
        }
    }

    /// Returns a copy extended with extra entries.
    #[must_use]
    pub fn extended(mut self, trusted: &[String], flagged: &[String]) -> Self {
        let more = Self::new(trusted, flagged);
        self.trusted.extend(more.trusted);
        self.flagged.extend(more.flagged);
        self
    }

    /// Classifies a source URL. The deny list wins over the allow list.
    #[must_use]
    pub fn classify(&self, source_url: &str) -> Credibility {
        let Some(host) = host_of(source_url) else {
            return Credibility::Unknown;
        };
        if self.flagged.iter().any(|d| domain_matches(&host, d)) {
            Credibility::Flagged
        } else if self.trusted.iter().any(|d| domain_matches(&host, d)) {
            Credibility::Trusted
        } else {
            Credibility::Unknown
        }
    }
}

fn domain_matches(host: &str, entry: &str) -> bool {
    if entry.starts_with('.') {
        host.ends_with(entry)
    } else {
        host == entry
            || host
                .strip_suffix(entry)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}
