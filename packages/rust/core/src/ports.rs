//! Collaborator traits consumed by the pipeline.
//!
//! Network clients live in `leadmagnet-providers`; tests use scripted
//! implementations. Every call is single-shot: retries, where any exist,
//! are decided by the caller.

use async_trait::async_trait;

use leadmagnet_shared::{Result, SearchResponse};

use crate::prompts;

/// Temperature used for JSON repair calls.
pub const REPAIR_TEMPERATURE: f32 = 0.0;

/// A language model able to produce free text and JSON.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate free-form (Markdown) text.
    async fn generate_text(&self, system: &str, user: &str, temperature: f32) -> Result<String>;

    /// Generate text in the provider's JSON mode. The returned string is
    /// raw and may still be malformed.
    async fn generate_structured(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String>;

    /// One repair pass over broken JSON, at zero temperature.
    async fn repair_json(&self, broken: &str) -> Result<String> {
        let prompt = prompts::build_json_repair_prompt(broken);
        self.generate_structured(&prompt.system, &prompt.user, REPAIR_TEMPERATURE)
            .await
    }
}

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one query. `Err` and a response without `results` both count as
    /// a failed query for the research aggregator.
    async fn search(&self, query: &str, max_results: u32) -> Result<SearchResponse>;
}

/// Persists finished documents.
pub trait DocumentStore: Send + Sync {
    /// Store `content` under a fresh, unique name and return its locator.
    fn persist(&self, content: &str) -> Result<String>;
}
