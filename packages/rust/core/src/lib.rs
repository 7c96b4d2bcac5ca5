//! Core pipeline orchestration and domain logic for the lead magnet
//! generator.
//!
//! This crate ties together query building, research aggregation, structure
//! planning, chapter writing and length-guarded editing into one sequential
//! run ([`pipeline::GenerationPipeline`]). Network and storage backends are
//! reached only through the traits in [`ports`].

pub mod editor;
pub mod export;
pub mod parser;
pub mod pipeline;
pub mod ports;
pub mod progress;
pub mod prompts;
pub mod research;
pub mod stage;

#[cfg(test)]
pub(crate) mod testing;

pub use editor::{LengthBand, SectionRewriter, edit_section_with_length_guard, word_count};
pub use export::{DocumentSections, FileStore, assemble_document, build_output_filename};
pub use parser::{ParseError, StructuredOutput, parse_structured};
pub use pipeline::{GenerationPipeline, PipelineOutput};
pub use ports::{DocumentStore, SearchProvider, TextGenerator};
pub use progress::{LogAccumulator, ProgressSink, ProgressUpdate, SilentProgress, Snapshot};
pub use stage::{PipelineStage, StageFailure, format_ui_error};
