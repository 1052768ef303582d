//! Normalization used for deduplication.
//!
//! Two search hits point at the same source when their normalized URLs are
//! equal; two queries are the same when their normalized texts are equal.

use url::Url;

/// Query parameters that only carry tracking state.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "msclkid", "mc_cid", "mc_eid", "ref", "ref_src"];

/// Normalizes query text: lowercase, whitespace collapsed, trimmed.
#[must_use]
pub fn normalize_query_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalizes a source URL into a scheme-less dedup key.
///
/// `http` and `https` collapse together, `www.` is dropped, fragments and
/// tracking parameters (`utm_*`, `fbclid`, ...) are removed and a trailing
/// slash on the path is ignored. Returns `None` for anything that is not
/// an absolute `http(s)` URL with a host.
#[must_use]
pub fn normalize_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let mut key = host.to_string();
    if let Some(port) = url.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }

    let path = url.path().trim_end_matches('/');
    key.push_str(path);

    let params: Vec<String> = url
        .query_pairs()
        .filter(|(k, _)| {
            let k = k.to_lowercase();
            !k.starts_with("utm_") && !TRACKING_PARAMS.contains(&k.as_str())
        })
        .map(|(k, v)| if v.is_empty() { k.into_owned() } else { format!("{k}={v}") })
        .collect();
    if !params.is_empty() {
        key.push('?');
        key.push_str(&params.join("&"));
    }

    Some(key)
}

/// Dedup key for a source: its normalized URL, or the trimmed lowercase
/// input when it does not parse as an `http(s)` URL.
#[must_use]
pub fn source_key(raw: &str) -> String {
    normalize_url(raw).unwrap_or_else(|| raw.trim().to_lowercase())
}

/// Returns the lowercase host of a URL without a leading `www.`.
#[must_use]
pub fn host_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}
