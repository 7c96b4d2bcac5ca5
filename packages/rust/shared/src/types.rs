//! Core domain types for lead magnet generation.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{LeadMagnetError, Result};

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Search results
// ---------------------------------------------------------------------------

/// One hit returned by the search provider.
///
/// Only `title`, `url`, `content` and `raw_content` are interpreted; any
/// other provider fields are kept in `extra` and never touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    /// Full page text, when the provider was asked for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SearchResult {
    /// Convenience constructor for the interpreted fields.
    pub fn new(title: impl Into<String>, url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            url: url.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    /// Attach full page text.
    pub fn with_raw_content(mut self, raw: impl Into<String>) -> Self {
        self.raw_content = Some(raw.into());
        self
    }
}

/// Raw response of one search call. `results: None` means the provider
/// answered without a results field, which counts as a failed query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Option<Vec<SearchResult>>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Research aggregate
// ---------------------------------------------------------------------------

/// Outcome of one submitted search query.
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchItem {
    pub query: String,
    pub success: bool,
    pub results: Vec<SearchResult>,
    /// Redacted failure reason; empty on success.
    pub error: String,
}

impl ResearchItem {
    pub fn succeeded(query: impl Into<String>, results: Vec<SearchResult>) -> Self {
        Self {
            query: query.into(),
            success: true,
            results,
            error: String::new(),
        }
    }

    pub fn failed(query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            success: false,
            results: Vec::new(),
            error: error.into(),
        }
    }
}

/// All research items of one search stage, in query order.
///
/// Counters are only changed through [`ResearchAggregate::push`], so
/// `success_count + fail_count == items.len()` always holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResearchAggregate {
    items: Vec<ResearchItem>,
    success_count: usize,
    fail_count: usize,
}

impl ResearchAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item and update the matching counter.
    pub fn push(&mut self, item: ResearchItem) {
        if item.success {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
        }
        self.items.push(item);
    }

    pub fn items(&self) -> &[ResearchItem] {
        &self.items
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn fail_count(&self) -> usize {
        self.fail_count
    }
}

impl FromIterator<ResearchItem> for ResearchAggregate {
    fn from_iter<I: IntoIterator<Item = ResearchItem>>(iter: I) -> Self {
        let mut aggregate = Self::new();
        for item in iter {
            aggregate.push(item);
        }
        aggregate
    }
}

// ---------------------------------------------------------------------------
// Structured generator outputs
// ---------------------------------------------------------------------------

/// Search queries produced by the query builder stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryList {
    pub queries: Vec<String>,
}

impl QueryList {
    /// Check the list is non-empty and holds no blank query.
    pub fn validate(&self) -> Result<()> {
        if self.queries.is_empty() {
            return Err(LeadMagnetError::validation("queries list cannot be empty"));
        }
        if let Some(pos) = self.queries.iter().position(|q| q.trim().is_empty()) {
            return Err(LeadMagnetError::validation(format!(
                "query {} is empty; all queries must be non-empty strings",
                pos + 1
            )));
        }
        Ok(())
    }
}

/// Plan for a single chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterPlan {
    pub title: String,
    /// Writing instructions for this chapter.
    pub prompt: String,
}

/// Title, framing text and chapter plan of the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStructure {
    pub title: String,
    pub subtitle: String,
    pub introduction: String,
    pub conclusions: String,
    pub chapters: Vec<ChapterPlan>,
}

impl DocumentStructure {
    /// Check required text fields and the chapter list are non-empty.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("title", &self.title),
            ("subtitle", &self.subtitle),
            ("introduction", &self.introduction),
            ("conclusions", &self.conclusions),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(LeadMagnetError::validation(format!(
                    "field `{name}` must be a non-empty string"
                )));
            }
        }

        if self.chapters.is_empty() {
            return Err(LeadMagnetError::validation("chapters list cannot be empty"));
        }
        for (i, chapter) in self.chapters.iter().enumerate() {
            if chapter.title.trim().is_empty() || chapter.prompt.trim().is_empty() {
                return Err(LeadMagnetError::validation(format!(
                    "chapter {} needs a non-empty title and prompt",
                    i + 1
                )));
            }
        }
        Ok(())
    }
}
