//! End-to-end generation pipeline: topic → queries → research → structure →
//! chapters → edited, polished and persisted document.

use std::time::Instant;

use tracing::{info, instrument};

use leadmagnet_shared::{DocumentStructure, GenerationSettings, QueryList, RunId};

use crate::editor::{DEFAULT_TOLERANCE, LlmSectionRewriter, edit_section_with_length_guard};
use crate::export::{DocumentSections, assemble_document};
use crate::parser::parse_structured;
use crate::ports::{DocumentStore, SearchProvider, TextGenerator};
use crate::progress::{ProgressSink, ProgressUpdate, emit_log, format_log_line};
use crate::prompts::{self, ChapterPromptInput};
use crate::research::{
    check_search_failure, format_research_context, merge_research_items, run_sequential_search,
};
use crate::stage::{PipelineStage, StageFailure};

/// Number of search queries requested from the query builder.
pub const QUERY_COUNT: usize = 5;

/// Sampling temperature for query generation.
pub const QUERY_TEMPERATURE: f32 = 0.3;

/// Sampling temperature for structure planning.
pub const STRUCTURE_TEMPERATURE: f32 = 0.5;

/// Search results requested per query unless overridden.
pub const DEFAULT_MAX_RESULTS: u32 = 5;

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub run_id: RunId,
    /// The polished document.
    pub markdown: String,
    /// Where the polished document was stored.
    pub locator: String,
    /// Where the pre-polish draft was stored.
    pub draft_locator: String,
}

/// One generation run. Create a fresh pipeline per topic.
pub struct GenerationPipeline<'a> {
    settings: GenerationSettings,
    generator: &'a dyn TextGenerator,
    search: &'a dyn SearchProvider,
    store: &'a dyn DocumentStore,
    progress: &'a dyn ProgressSink,
    max_results: u32,
    run_id: RunId,
    queries: Vec<String>,
}

impl<'a> GenerationPipeline<'a> {
    pub fn new(
        settings: GenerationSettings,
        generator: &'a dyn TextGenerator,
        search: &'a dyn SearchProvider,
        store: &'a dyn DocumentStore,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            settings,
            generator,
            search,
            store,
            progress,
            max_results: DEFAULT_MAX_RESULTS,
            run_id: RunId::new(),
            queries: Vec::new(),
        }
    }

    /// Override the number of search results requested per query.
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Run all stages in order. The first failing stage aborts the run.
    ///
    /// Dropping the returned future between stages abandons the run.
    #[instrument(skip_all, fields(run_id = %self.run_id, topic = topic))]
    pub async fn run(mut self, topic: &str) -> Result<PipelineOutput, StageFailure> {
        let start = Instant::now();
        info!(
            chapters = self.settings.chapter_count(),
            words_per_chapter = self.settings.words_per_chapter(),
            section_editors = self.settings.enable_section_editors(),
            "starting generation pipeline"
        );

        self.build_queries(topic).await?;
        let context = self.research().await?;
        let structure = self.plan_structure(&context).await?;
        let chapters = self.write_chapters(&structure, &context).await?;
        let output = self.assemble(&structure, chapters).await?;

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            locator = %output.locator,
            "generation pipeline complete"
        );
        Ok(output)
    }

    fn log(&self, stage: PipelineStage, message: &str) {
        emit_log(self.progress, stage.label(), message);
    }

    // --- Stage 1: queries ---

    async fn build_queries(&mut self, topic: &str) -> Result<(), StageFailure> {
        let stage = PipelineStage::QueryBuilder;
        self.log(stage, &format!("Generating {QUERY_COUNT} search queries"));

        let prompt = prompts::build_query_prompt(topic, QUERY_COUNT);
        let raw = self
            .generator
            .generate_structured(&prompt.system, &prompt.user, QUERY_TEMPERATURE)
            .await
            .map_err(|e| StageFailure::fatal(stage.label(), &e))?;

        let list: QueryList = parse_structured(&raw, QUERY_COUNT, Some(self.generator))
            .await
            .map_err(|e| StageFailure::fatal(stage.label(), &e))?;

        self.log(
            stage,
            &format!("Generated {} queries: {}", list.queries.len(), list.queries.join(" | ")),
        );
        self.queries = list.queries;
        Ok(())
    }

    // --- Stage 2: research ---

    async fn research(&self) -> Result<String, StageFailure> {
        let stage = PipelineStage::Search;
        self.log(
            stage,
            &format!("Running {} queries sequentially", self.queries.len()),
        );

        let aggregate = run_sequential_search(&self.queries, self.search, self.max_results).await;
        for (idx, item) in aggregate.items().iter().enumerate() {
            let line = if item.success {
                format!("Query {} returned {} results", idx + 1, item.results.len())
            } else {
                format!("Query {} failed: {}", idx + 1, item.error)
            };
            self.log(stage, &line);
        }

        if check_search_failure(&aggregate) {
            let reason = format!(
                "All {} search queries failed; check the search API key and connectivity",
                aggregate.fail_count()
            );
            return Err(StageFailure::recoverable(stage.label(), &reason));
        }

        let merged = merge_research_items(&aggregate);
        let context = format_research_context(&merged);
        self.log(
            stage,
            &format!(
                "Collected {} sources ({} queries succeeded, {} failed)",
                merged.len(),
                aggregate.success_count(),
                aggregate.fail_count()
            ),
        );
        Ok(context)
    }

    // --- Stage 3: structure ---

    async fn plan_structure(&self, context: &str) -> Result<DocumentStructure, StageFailure> {
        let stage = PipelineStage::StructurePlanner;
        let chapter_count = self.settings.chapter_count();
        self.log(
            stage,
            &format!("Planning a document with {chapter_count} chapters"),
        );

        let prompt = prompts::build_structure_prompt(context, chapter_count);
        let raw = self
            .generator
            .generate_structured(&prompt.system, &prompt.user, STRUCTURE_TEMPERATURE)
            .await
            .map_err(|e| StageFailure::fatal(stage.label(), &e))?;

        let structure: DocumentStructure =
            parse_structured(&raw, chapter_count as usize, Some(self.generator))
                .await
                .map_err(|e| StageFailure::fatal(stage.label(), &e))?;

        self.log(
            stage,
            &format!(
                "Planned \"{}\" with {} chapters",
                structure.title,
                structure.chapters.len()
            ),
        );
        Ok(structure)
    }

    // --- Stage 4: chapters ---

    async fn write_chapters(
        &self,
        structure: &DocumentStructure,
        context: &str,
    ) -> Result<Vec<String>, StageFailure> {
        let stage = PipelineStage::ChapterWriter;
        let total = structure.chapters.len();
        let mut chapters = Vec::with_capacity(total);

        for (idx, plan) in structure.chapters.iter().enumerate() {
            let number = idx + 1;
            self.log(
                stage,
                &format!("Writing chapter {number}/{total}: {}", plan.title),
            );

            let prompt = prompts::build_chapter_writer_prompt(&ChapterPromptInput {
                main_title: &structure.title,
                chapter_title: &plan.title,
                chapter_prompt: &plan.prompt,
                research_context: context,
                word_limit: self.settings.words_per_chapter(),
                keep_links: self.settings.keep_links(),
            });
            let text = self
                .generator
                .generate_text(&prompt.system, &prompt.user, self.settings.temperature())
                .await
                .map_err(|e| {
                    StageFailure::fatal(format!("{} (chapter {number})", stage.label()), &e)
                })?;
            chapters.push(text);
        }

        self.log(stage, &format!("Wrote {total} chapters"));
        Ok(chapters)
    }

    // --- Stage 5: assembly, editing, polish ---

    async fn assemble(
        &self,
        structure: &DocumentStructure,
        chapters: Vec<String>,
    ) -> Result<PipelineOutput, StageFailure> {
        let stage = PipelineStage::Assembly;

        let sections = if self.settings.enable_section_editors() {
            self.log(stage, "Editing sections within their length bands");
            self.edit_sections(structure, chapters).await
        } else {
            DocumentSections {
                introduction: structure.introduction.clone(),
                chapters,
                conclusion: structure.conclusions.clone(),
            }
        };

        let draft = assemble_document(structure, &sections);
        let draft_locator = self
            .store
            .persist(&draft)
            .map_err(|e| StageFailure::fatal(stage.label(), &e))?;
        self.log(stage, &format!("Draft saved to {draft_locator}"));

        self.log(stage, "Running final editorial polish");
        let prompt = prompts::build_final_editor_prompt(&draft, self.settings.keep_links());
        let polished = self
            .generator
            .generate_text(
                &prompt.system,
                &prompt.user,
                self.settings.editor_temperature(),
            )
            .await
            .map_err(|e| StageFailure::fatal(stage.label(), &e))?;

        if polished.trim().is_empty() {
            return Err(StageFailure::fatal(
                stage.label(),
                &"final editor returned an empty document",
            ));
        }

        let locator = self
            .store
            .persist(&polished)
            .map_err(|e| StageFailure::fatal(stage.label(), &e))?;

        info!(%locator, "final document persisted");
        self.progress.emit(ProgressUpdate::result(
            format_log_line(stage.label(), &format!("Final document saved to {locator}")),
            polished.clone(),
            locator.clone(),
        ));

        Ok(PipelineOutput {
            run_id: self.run_id.clone(),
            markdown: polished,
            locator,
            draft_locator,
        })
    }

    /// Introduction, then each chapter in order, then the conclusion.
    async fn edit_sections(
        &self,
        structure: &DocumentStructure,
        chapters: Vec<String>,
    ) -> DocumentSections {
        let rewriter = LlmSectionRewriter::new(
            self.generator,
            self.settings.editor_temperature(),
            self.settings.keep_links(),
        );

        let introduction = edit_section_with_length_guard(
            "Introduction",
            &structure.introduction,
            &rewriter,
            DEFAULT_TOLERANCE,
        )
        .await;

        let mut edited = Vec::with_capacity(chapters.len());
        for (idx, chapter) in chapters.iter().enumerate() {
            let name = format!("Chapter {}", idx + 1);
            edited.push(
                edit_section_with_length_guard(&name, chapter, &rewriter, DEFAULT_TOLERANCE).await,
            );
        }

        let conclusion = edit_section_with_length_guard(
            "Conclusion",
            &structure.conclusions,
            &rewriter,
            DEFAULT_TOLERANCE,
        )
        .await;

        DocumentSections {
            introduction,
            chapters: edited,
            conclusion,
        }
    }
}

#[cfg(test)]
mod tests {
    use leadmagnet_shared::{ChapterPlan, LeadMagnetError, SettingsInput};
    use serde_json::json;

    use super::*;
    use crate::progress::LogAccumulator;
    use crate::testing::{MemoryStore, RecordingSink, ScriptedGenerator, StubSearch};

    const QUERIES: &str = r#"{"queries":["q1","q2","q3","q4","q5"]}"#;

    fn settings(chapters: i64, section_editors: bool) -> GenerationSettings {
        GenerationSettings::new(SettingsInput {
            chapter_count: chapters,
            enable_section_editors: section_editors,
            ..SettingsInput::default()
        })
    }

    fn structure_json(chapters: usize) -> String {
        let structure = DocumentStructure {
            title: "Remote Work Playbook".into(),
            subtitle: "Habits that scale".into(),
            introduction: "Why remote work needs deliberate habits.".into(),
            conclusions: "Start small and iterate on your routine.".into(),
            chapters: (1..=chapters)
                .map(|i| ChapterPlan {
                    title: format!("Topic {i}"),
                    prompt: format!("Explain topic {i}"),
                })
                .collect(),
        };
        serde_json::to_string(&structure).unwrap()
    }

    /// Echoes section text back for section edits and the draft for the
    /// final polish.
    fn echo_editor(system: &str, user: &str) -> leadmagnet_shared::Result<String> {
        if system.starts_with("Role: Section Editor") {
            let body = user.split_once("\n\n").map(|(_, b)| b).unwrap_or_default();
            Ok(body.to_string())
        } else if system.starts_with("Role: Expert Editor") {
            Ok(user.trim_start_matches("Draft Content:\n").to_string())
        } else {
            Err(LeadMagnetError::Llm(format!("unexpected prompt: {system}")))
        }
    }

    fn chapter_texts(n: usize) -> Vec<leadmagnet_shared::Result<String>> {
        (1..=n)
            .map(|i| Ok(format!("Body of chapter {i} with several useful words.")))
            .collect()
    }

    #[tokio::test]
    async fn end_to_end_produces_document_and_locator() {
        let generator = ScriptedGenerator::new()
            .with_structured(vec![Ok(QUERIES.into()), Ok(structure_json(3))])
            .with_text(chapter_texts(3))
            .with_text_fallback(echo_editor);
        let search = StubSearch::new();
        let store = MemoryStore::new();
        let sink = RecordingSink::new();

        let output = GenerationPipeline::new(settings(3, true), &generator, &search, &store, &sink)
            .run("remote work")
            .await
            .unwrap();

        assert!(output.markdown.starts_with("# Remote Work Playbook"));
        for n in 1..=3 {
            assert!(output.markdown.contains(&format!("## Chapter {n}")));
        }
        assert!(!output.markdown.contains("## Chapter 4"));
        assert!(output.markdown.contains("## Conclusion"));
        assert_eq!(output.draft_locator, "memory://1");
        assert_eq!(output.locator, "memory://2");
        assert_eq!(store.documents().len(), 2);
        assert_eq!(search.seen(), vec!["q1", "q2", "q3", "q4", "q5"]);

        let last = sink.updates().pop().unwrap();
        assert_eq!(last.locator.as_deref(), Some("memory://2"));
        assert_eq!(last.markdown.as_deref(), Some(output.markdown.as_str()));
    }

    #[tokio::test]
    async fn calls_use_stage_temperatures_in_order() {
        let generator = ScriptedGenerator::new()
            .with_structured(vec![Ok(QUERIES.into()), Ok(structure_json(2))])
            .with_text(chapter_texts(2))
            .with_text_fallback(echo_editor);
        let store = MemoryStore::new();
        let input = SettingsInput {
            chapter_count: 2,
            temperature: 0.9,
            editor_temperature: 0.1,
            ..SettingsInput::default()
        };

        GenerationPipeline::new(
            GenerationSettings::new(input),
            &generator,
            &StubSearch::new(),
            &store,
            &RecordingSink::new(),
        )
        .run("topic")
        .await
        .unwrap();

        let calls = generator.calls();
        let temps: Vec<f32> = calls.iter().map(|c| c.temperature).collect();
        // queries, structure, 2 chapters, intro, 2 chapter edits, conclusion, polish
        assert_eq!(temps, vec![0.3, 0.5, 0.9, 0.9, 0.1, 0.1, 0.1, 0.1, 0.1]);

        let edited: Vec<&str> = calls[4..8]
            .iter()
            .map(|c| c.user.lines().next().unwrap_or_default())
            .collect();
        assert_eq!(
            edited,
            vec!["Section: Introduction", "Section: Chapter 1", "Section: Chapter 2", "Section: Conclusion"]
        );
    }

    #[tokio::test]
    async fn without_section_editors_draft_is_plain_template() {
        let generator = ScriptedGenerator::new()
            .with_structured(vec![Ok(QUERIES.into()), Ok(structure_json(1))])
            .with_text(vec![Ok("Only chapter.".into()), Ok("# Polished".into())]);
        let store = MemoryStore::new();

        let output = GenerationPipeline::new(
            settings(1, false),
            &generator,
            &StubSearch::new(),
            &store,
            &RecordingSink::new(),
        )
        .run("topic")
        .await
        .unwrap();

        assert_eq!(generator.calls().len(), 4);
        assert_eq!(output.markdown, "# Polished");
        assert_eq!(
            store.documents()[0],
            "# Remote Work Playbook\n\n## Habits that scale\n\n\
             Why remote work needs deliberate habits.\n\n## Chapter 1\n\nOnly chapter.\n\n\
             ## Conclusion\n\nStart small and iterate on your routine."
        );
    }

    #[tokio::test]
    async fn progress_lines_follow_stage_order() {
        let generator = ScriptedGenerator::new()
            .with_structured(vec![Ok(QUERIES.into()), Ok(structure_json(2))])
            .with_text(chapter_texts(2))
            .with_text_fallback(echo_editor);
        let sink = RecordingSink::new();

        GenerationPipeline::new(
            settings(2, true),
            &generator,
            &StubSearch::new(),
            &MemoryStore::new(),
            &sink,
        )
        .run("topic")
        .await
        .unwrap();

        let lines = sink.lines();
        let first_index = |label: &str| {
            lines
                .iter()
                .position(|l| l.starts_with(&format!("📍 {label}:")))
                .unwrap()
        };
        let order: Vec<usize> = PipelineStage::ALL
            .iter()
            .map(|s| first_index(s.label()))
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(lines[0], "📍 Query Builder: Generating 5 search queries");

        let query_lines: Vec<&String> = lines
            .iter()
            .filter(|l| l.starts_with("📍 Search: Query "))
            .collect();
        assert_eq!(query_lines.len(), 5);
        assert!(query_lines[0].contains("Query 1"));
        assert!(query_lines[4].contains("Query 5"));
    }

    #[tokio::test]
    async fn total_search_failure_is_recoverable() {
        let generator = ScriptedGenerator::new().with_structured(vec![Ok(QUERIES.into())]);
        let search = StubSearch::new().fail_all(&["q1", "q2", "q3", "q4", "q5"]);
        let store = MemoryStore::new();

        let failure = GenerationPipeline::new(
            settings(3, true),
            &generator,
            &search,
            &store,
            &RecordingSink::new(),
        )
        .run("topic")
        .await
        .unwrap_err();

        assert_eq!(failure.stage(), "Search");
        assert!(failure.is_recoverable());
        assert_eq!(search.seen().len(), 5);
        assert_eq!(generator.structured_calls(), 1);
        assert!(store.documents().is_empty());
    }

    #[tokio::test]
    async fn partial_search_failure_continues() {
        let generator = ScriptedGenerator::new()
            .with_structured(vec![Ok(QUERIES.into()), Ok(structure_json(1))])
            .with_text(vec![Ok("Chapter.".into()), Ok("# Done".into())]);
        let search = StubSearch::new().fail_all(&["q1", "q2", "q3", "q4"]);

        let output = GenerationPipeline::new(
            settings(1, false),
            &generator,
            &search,
            &MemoryStore::new(),
            &RecordingSink::new(),
        )
        .run("topic")
        .await
        .unwrap();
        assert_eq!(output.markdown, "# Done");

        let structure_call = &generator.calls()[1];
        assert!(structure_call.user.contains("Source 1:\nTitle: q5 result 1"));
    }

    #[tokio::test]
    async fn query_output_is_coerced_from_alias_key() {
        let generator = ScriptedGenerator::new()
            .with_structured(vec![
                Ok(json!({"search_queries": ["a", "b", "c", "d", "e"]}).to_string()),
                Ok(structure_json(1)),
            ])
            .with_text(vec![Ok("Chapter.".into()), Ok("# Done".into())]);
        let search = StubSearch::new();

        GenerationPipeline::new(
            settings(1, false),
            &generator,
            &search,
            &MemoryStore::new(),
            &RecordingSink::new(),
        )
        .run("topic")
        .await
        .unwrap();
        assert_eq!(search.seen(), vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn unrepairable_queries_fail_query_stage() {
        let generator = ScriptedGenerator::new()
            .with_structured(vec![Ok("no json here".into()), Ok("still none".into())]);

        let failure = GenerationPipeline::new(
            settings(1, false),
            &generator,
            &StubSearch::new(),
            &MemoryStore::new(),
            &RecordingSink::new(),
        )
        .run("topic")
        .await
        .unwrap_err();

        assert_eq!(failure.stage(), "Query Builder");
        assert!(!failure.is_recoverable());
        assert!(failure.message().contains("repair"));
    }

    #[tokio::test]
    async fn chapter_count_mismatch_fails_structure_stage() {
        let generator = ScriptedGenerator::new()
            .with_structured(vec![Ok(QUERIES.into()), Ok(structure_json(2))]);

        let failure = GenerationPipeline::new(
            settings(5, true),
            &generator,
            &StubSearch::new(),
            &MemoryStore::new(),
            &RecordingSink::new(),
        )
        .run("topic")
        .await
        .unwrap_err();

        assert_eq!(failure.stage(), "Structure Planner");
        assert_eq!(failure.message(), "expected 5 chapters, got 2");
    }

    #[tokio::test]
    async fn chapter_failure_is_tagged_with_index() {
        let generator = ScriptedGenerator::new()
            .with_structured(vec![Ok(QUERIES.into()), Ok(structure_json(3))])
            .with_text(vec![
                Ok("First.".into()),
                Err(LeadMagnetError::Llm("HTTP 429 rate limited".into())),
            ]);
        let store = MemoryStore::new();

        let failure = GenerationPipeline::new(
            settings(3, true),
            &generator,
            &StubSearch::new(),
            &store,
            &RecordingSink::new(),
        )
        .run("topic")
        .await
        .unwrap_err();

        assert_eq!(failure.stage(), "Chapter Writer (chapter 2)");
        assert!(!failure.is_recoverable());
        assert!(failure.message().contains("rate limited"));
        assert!(store.documents().is_empty());
    }

    #[tokio::test]
    async fn empty_polish_fails_assembly() {
        let generator = ScriptedGenerator::new()
            .with_structured(vec![Ok(QUERIES.into()), Ok(structure_json(1))])
            .with_text(vec![Ok("Chapter.".into()), Ok("   ".into())]);
        let store = MemoryStore::new();

        let failure = GenerationPipeline::new(
            settings(1, false),
            &generator,
            &StubSearch::new(),
            &store,
            &RecordingSink::new(),
        )
        .run("topic")
        .await
        .unwrap_err();

        assert_eq!(failure.stage(), "Assembly");
        assert_eq!(store.documents().len(), 1);
    }

    #[tokio::test]
    async fn store_failure_fails_assembly() {
        let generator = ScriptedGenerator::new()
            .with_structured(vec![Ok(QUERIES.into()), Ok(structure_json(1))])
            .with_text(vec![Ok("Chapter.".into())]);

        let failure = GenerationPipeline::new(
            settings(1, false),
            &generator,
            &StubSearch::new(),
            &MemoryStore::failing(),
            &RecordingSink::new(),
        )
        .run("topic")
        .await
        .unwrap_err();

        assert_eq!(failure.stage(), "Assembly");
        assert!(failure.message().contains("disk full"));
    }

    #[tokio::test]
    async fn accumulator_tracks_latest_result() {
        let generator = ScriptedGenerator::new()
            .with_structured(vec![Ok(QUERIES.into()), Ok(structure_json(1))])
            .with_text(vec![Ok("Chapter.".into()), Ok("# Final".into())]);
        let acc = LogAccumulator::new(|_, _| {});

        GenerationPipeline::new(
            settings(1, false),
            &generator,
            &StubSearch::new(),
            &MemoryStore::new(),
            &acc,
        )
        .run("topic")
        .await
        .unwrap();

        let snap = acc.snapshot();
        assert_eq!(snap.markdown.as_deref(), Some("# Final"));
        assert_eq!(snap.locator.as_deref(), Some("memory://2"));
        assert!(snap.log.starts_with("📍 Query Builder:"));
        assert!(snap.log.lines().last().unwrap().contains("memory://2"));
    }
}
