//! HTTP clients implementing the core collaborator traits.
//!
//! - [`OpenAiCompatibleClient`]: any OpenAI-compatible chat completions API
//! - [`TavilyClient`]: Tavily web search

pub mod llm;
pub mod search;

pub use llm::OpenAiCompatibleClient;
pub use search::TavilyClient;

use url::Url;

/// User-Agent sent with every request.
pub(crate) const USER_AGENT: &str = concat!("leadmagnet/", env!("CARGO_PKG_VERSION"));

/// Longest response body excerpt kept in error messages.
const BODY_EXCERPT_CHARS: usize = 300;

/// Join `path` onto `base_url`, which must be an absolute http(s) URL.
pub(crate) fn endpoint(base_url: &str, path: &str) -> std::result::Result<String, String> {
    let base = Url::parse(base_url.trim())
        .map_err(|e| format!("invalid base URL {base_url:?}: {e}"))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(format!("base URL must use http or https: {base_url}"));
    }
    Ok(format!("{}/{path}", base.as_str().trim_end_matches('/')))
}

/// First characters of a response body, for error messages.
pub(crate) fn body_excerpt(body: &str) -> String {
    let trimmed = body.trim();
    let mut excerpt: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
    if trimmed.chars().count() > BODY_EXCERPT_CHARS {
        excerpt.push_str("...");
    }
    excerpt
}
