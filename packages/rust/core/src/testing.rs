//! Scripted collaborators for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use leadmagnet_shared::{LeadMagnetError, Result, SearchResponse, SearchResult};

use crate::ports::{DocumentStore, SearchProvider, TextGenerator};
use crate::progress::{ProgressSink, ProgressUpdate};

/// One recorded generator call.
#[derive(Debug, Clone)]
pub struct GeneratorCall {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub structured: bool,
}

type Responder = Box<dyn Fn(&str, &str) -> Result<String> + Send + Sync>;

/// Answers structured and text calls from separate queues, then from an
/// optional text fallback.
#[derive(Default)]
pub struct ScriptedGenerator {
    structured: Mutex<VecDeque<Result<String>>>,
    text: Mutex<VecDeque<Result<String>>>,
    text_fallback: Option<Responder>,
    calls: Mutex<Vec<GeneratorCall>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_structured(mut self, outputs: Vec<Result<String>>) -> Self {
        self.structured.get_mut().unwrap().extend(outputs);
        self
    }

    pub fn with_text(mut self, outputs: Vec<Result<String>>) -> Self {
        self.text.get_mut().unwrap().extend(outputs);
        self
    }

    /// Used for text calls once the text queue is empty.
    pub fn with_text_fallback(
        mut self,
        responder: impl Fn(&str, &str) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        self.text_fallback = Some(Box::new(responder));
        self
    }

    pub fn calls(&self) -> Vec<GeneratorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn structured_calls(&self) -> usize {
        self.calls().iter().filter(|c| c.structured).count()
    }

    fn record(&self, system: &str, user: &str, temperature: f32, structured: bool) {
        self.calls.lock().unwrap().push(GeneratorCall {
            system: system.to_string(),
            user: user.to_string(),
            temperature,
            structured,
        });
    }
}

fn exhausted(kind: &str) -> LeadMagnetError {
    LeadMagnetError::Llm(format!("scripted {kind} responses exhausted"))
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate_text(&self, system: &str, user: &str, temperature: f32) -> Result<String> {
        self.record(system, user, temperature, false);
        let next = self.text.lock().unwrap().pop_front();
        match (next, &self.text_fallback) {
            (Some(out), _) => out,
            (None, Some(responder)) => responder(system, user),
            (None, None) => Err(exhausted("text")),
        }
    }

    async fn generate_structured(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String> {
        self.record(system, user, temperature, true);
        self.structured
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("structured")))
    }
}

/// Search stub returning `hits` results per query unless told otherwise.
pub struct StubSearch {
    hits: usize,
    failures: HashMap<String, String>,
    missing_results: HashSet<String>,
    seen: Mutex<Vec<String>>,
}

impl StubSearch {
    pub fn new() -> Self {
        Self {
            hits: 2,
            failures: HashMap::new(),
            missing_results: HashSet::new(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_hits(mut self, hits: usize) -> Self {
        self.hits = hits;
        self
    }

    pub fn fail_on(mut self, query: &str, message: &str) -> Self {
        self.failures.insert(query.to_string(), message.to_string());
        self
    }

    pub fn fail_all(mut self, queries: &[&str]) -> Self {
        for q in queries {
            self.failures.insert(q.to_string(), "service unavailable".to_string());
        }
        self
    }

    pub fn missing_results_on(mut self, query: &str) -> Self {
        self.missing_results.insert(query.to_string());
        self
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, query: &str, max_results: u32) -> Result<SearchResponse> {
        self.seen.lock().unwrap().push(query.to_string());

        if let Some(message) = self.failures.get(query) {
            return Err(LeadMagnetError::Search(message.clone()));
        }
        if self.missing_results.contains(query) {
            return Ok(SearchResponse { results: None });
        }

        let results = (1..=self.hits.min(max_results as usize))
            .map(|i| {
                SearchResult::new(
                    format!("{query} result {i}"),
                    format!("https://example.com/{i}"),
                    format!("Findings about {query}"),
                )
            })
            .collect();
        Ok(SearchResponse {
            results: Some(results),
        })
    }
}

/// Keeps persisted documents in memory.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<Vec<String>>,
    fail: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn documents(&self) -> Vec<String> {
        self.documents.lock().unwrap().clone()
    }
}

impl DocumentStore for MemoryStore {
    fn persist(&self, content: &str) -> Result<String> {
        if self.fail {
            return Err(LeadMagnetError::io(
                "memory",
                std::io::Error::other("disk full"),
            ));
        }
        let mut docs = self.documents.lock().unwrap();
        docs.push(content.to_string());
        Ok(format!("memory://{}", docs.len()))
    }
}

/// Records every progress update.
#[derive(Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.updates().into_iter().map(|u| u.log_line).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, update: ProgressUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}
