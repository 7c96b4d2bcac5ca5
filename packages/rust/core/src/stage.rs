//! Pipeline stages and the stage failure envelope.

use std::fmt;

use tracing::error;

use leadmagnet_shared::redact_secrets;

/// The fixed, ordered stages of one generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    QueryBuilder,
    Search,
    StructurePlanner,
    ChapterWriter,
    Assembly,
}

impl PipelineStage {
    /// All stages in execution order.
    pub const ALL: [PipelineStage; 5] = [
        Self::QueryBuilder,
        Self::Search,
        Self::StructurePlanner,
        Self::ChapterWriter,
        Self::Assembly,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::QueryBuilder => "Query Builder",
            Self::Search => "Search",
            Self::StructurePlanner => "Structure Planner",
            Self::ChapterWriter => "Chapter Writer",
            Self::Assembly => "Assembly",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A stage failed; the run is aborted.
///
/// The message is always redacted. `recoverable` only selects the severity
/// shown to the user; nothing is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage}: {message}")]
pub struct StageFailure {
    stage: String,
    message: String,
    recoverable: bool,
}

impl StageFailure {
    /// Wrap an error from `stage`, redacting its message and logging it.
    pub fn from_error(stage: impl Into<String>, err: &impl fmt::Display, recoverable: bool) -> Self {
        let stage = stage.into();
        let message = redact_secrets(&err.to_string());
        error!(stage = %stage, recoverable, error = %message, "stage failed");
        Self {
            stage,
            message,
            recoverable,
        }
    }

    pub fn fatal(stage: impl Into<String>, err: &impl fmt::Display) -> Self {
        Self::from_error(stage, err, false)
    }

    pub fn recoverable(stage: impl Into<String>, err: &impl fmt::Display) -> Self {
        Self::from_error(stage, err, true)
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }
}

/// User-facing rendering: severity icon and stage on the first line, the
/// redacted message on the second.
pub fn format_ui_error(failure: &StageFailure) -> String {
    let heading = if failure.recoverable {
        "⚠️ Recoverable failure"
    } else {
        "❌ Fatal failure"
    };
    format!("{heading} at stage {}\n{}", failure.stage, failure.message)
}
