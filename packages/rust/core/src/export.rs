//! Document assembly and file-backed persistence.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use tracing::{debug, info};

use leadmagnet_shared::{DocumentStructure, LeadMagnetError, Result};

use crate::ports::DocumentStore;

/// Section bodies placed into the document template, possibly edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSections {
    pub introduction: String,
    pub chapters: Vec<String>,
    pub conclusion: String,
}

/// Render the fixed document template.
///
/// Parts are separated by one blank line:
/// `# title`, `## subtitle`, introduction, `## Chapter N` + text for each
/// chapter, then `## Conclusion` + conclusion.
pub fn assemble_document(structure: &DocumentStructure, sections: &DocumentSections) -> String {
    let mut parts = Vec::with_capacity(4 + sections.chapters.len() * 2);
    parts.push(format!("# {}", structure.title));
    parts.push(format!("## {}", structure.subtitle));
    parts.push(sections.introduction.clone());

    for (idx, chapter) in sections.chapters.iter().enumerate() {
        parts.push(format!("## Chapter {}", idx + 1));
        parts.push(chapter.clone());
    }

    parts.push("## Conclusion".to_string());
    parts.push(sections.conclusion.clone());
    parts.join("\n\n")
}

/// `{prefix}_{YYYYmmdd_HHMMSS}.md` for the given instant.
pub fn build_output_filename<Tz: TimeZone>(prefix: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{prefix}_{}.md", at.format("%Y%m%d_%H%M%S"))
}

/// Writes each document to a new timestamped Markdown file.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    prefix: String,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist `content` using `at` as the timestamp.
    ///
    /// Files are opened create-new; a name already taken within the same
    /// second gets a `_{n}` suffix.
    pub fn persist_at(&self, content: &str, at: &DateTime<Local>) -> Result<String> {
        std::fs::create_dir_all(&self.dir).map_err(|e| LeadMagnetError::io(&self.dir, e))?;

        let base = build_output_filename(&self.prefix, at);
        let stem = base.trim_end_matches(".md");

        let mut candidate = self.dir.join(&base);
        let mut suffix = 1u32;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(mut file) => {
                    file.write_all(content.as_bytes())
                        .map_err(|e| LeadMagnetError::io(&candidate, e))?;
                    info!(path = %candidate.display(), bytes = content.len(), "document saved");
                    return Ok(candidate.display().to_string());
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(path = %candidate.display(), "output name taken");
                    candidate = self.dir.join(format!("{stem}_{suffix}.md"));
                    suffix += 1;
                }
                Err(e) => return Err(LeadMagnetError::io(&candidate, e)),
            }
        }
    }
}

impl DocumentStore for FileStore {
    fn persist(&self, content: &str) -> Result<String> {
        self.persist_at(content, &Local::now())
    }
}
