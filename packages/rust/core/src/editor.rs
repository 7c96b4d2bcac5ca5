//! Length-guarded section editing.
//!
//! Each section is rewritten by a [`SectionRewriter`] and the result is only
//! accepted if its word count stays inside a band around the original
//! length. Two attempts are made; after that the original text is kept.

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use leadmagnet_shared::{Result, redact_secrets};

use crate::ports::TextGenerator;
use crate::prompts;

/// Allowed relative deviation from the original word count.
pub const DEFAULT_TOLERANCE: f64 = 0.15;

/// Attempts per section before falling back to the original.
pub const MAX_EDIT_ATTEMPTS: usize = 2;

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Inclusive word-count band an edit must land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthBand {
    pub min_words: usize,
    pub max_words: usize,
}

impl LengthBand {
    pub fn compute(text: &str, tolerance: f64) -> Self {
        let base = word_count(text).max(1) as f64;
        let min_words = ((base * (1.0 - tolerance)).floor() as usize).max(1);
        let max_words = ((base * (1.0 + tolerance)).ceil() as usize).max(min_words);
        Self {
            min_words,
            max_words,
        }
    }

    pub fn contains(&self, words: usize) -> bool {
        (self.min_words..=self.max_words).contains(&words)
    }
}

/// One rewrite request handed to a [`SectionRewriter`].
#[derive(Debug, Clone, Copy)]
pub struct EditRequest<'a> {
    pub section_name: &'a str,
    pub text: &'a str,
    pub band: LengthBand,
}

/// Rewrites a single section. Identical requests may yield different text.
#[async_trait]
pub trait SectionRewriter: Send + Sync {
    async fn rewrite(&self, request: &EditRequest<'_>) -> Result<String>;
}

/// Rewriter backed by a text generator and the section-editor prompt.
pub struct LlmSectionRewriter<'a> {
    generator: &'a dyn TextGenerator,
    temperature: f32,
    keep_links: bool,
}

impl<'a> LlmSectionRewriter<'a> {
    pub fn new(generator: &'a dyn TextGenerator, temperature: f32, keep_links: bool) -> Self {
        Self {
            generator,
            temperature,
            keep_links,
        }
    }
}

#[async_trait]
impl SectionRewriter for LlmSectionRewriter<'_> {
    async fn rewrite(&self, request: &EditRequest<'_>) -> Result<String> {
        let prompt = prompts::build_section_editor_prompt(
            request.section_name,
            request.text,
            request.band.min_words,
            request.band.max_words,
            self.keep_links,
        );
        self.generator
            .generate_text(&prompt.system, &prompt.user, self.temperature)
            .await
    }
}

/// Rewrite `text` within the length band, or return it unchanged.
///
/// Never fails: rewriter errors count as out-of-band attempts.
#[instrument(skip_all, fields(section = section_name))]
pub async fn edit_section_with_length_guard(
    section_name: &str,
    text: &str,
    rewriter: &dyn SectionRewriter,
    tolerance: f64,
) -> String {
    let band = LengthBand::compute(text, tolerance);
    let request = EditRequest {
        section_name,
        text,
        band,
    };
    debug!(min = band.min_words, max = band.max_words, "length band");

    for attempt in 1..=MAX_EDIT_ATTEMPTS {
        match rewriter.rewrite(&request).await {
            Ok(edited) => {
                let edited = edited.trim();
                let words = word_count(edited);
                if band.contains(words) {
                    info!(attempt, words, "section edit accepted");
                    return edited.to_string();
                }
                warn!(
                    attempt,
                    words,
                    min = band.min_words,
                    max = band.max_words,
                    "section edit outside length band"
                );
            }
            Err(e) => {
                warn!(attempt, error = %redact_secrets(&e.to_string()), "section edit failed");
            }
        }
    }

    info!("keeping original section text");
    text.to_string()
}
