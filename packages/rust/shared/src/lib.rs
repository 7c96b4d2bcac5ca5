//! Shared types, error model, settings and configuration for the lead
//! magnet generator.
//!
//! This crate is the foundation depended on by all other workspace crates.
//! It provides:
//! - [`LeadMagnetError`]: the unified error type
//! - Domain types ([`QueryList`], [`DocumentStructure`], [`SearchResult`], [`ResearchAggregate`], [`RunId`])
//! - [`GenerationSettings`] with range clamping
//! - Configuration ([`AppConfig`], config loading and validation)
//! - [`redact_secrets`] for error messages

pub mod config;
pub mod error;
pub mod redact;
pub mod settings;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, Credentials, LlmConfig, OutputConfig, SearchConfig, apply_env_overrides,
    config_dir, config_file_path, init_config, load_config, load_config_from,
    settings_file_path, validate_config,
};
pub use error::{LeadMagnetError, Result};
pub use redact::{REDACTION_MARKER, redact_secrets};
pub use settings::{GenerationSettings, SettingsInput, load_settings, save_settings};
pub use types::{
    ChapterPlan, DocumentStructure, QueryList, ResearchAggregate, ResearchItem, RunId,
    SearchResponse, SearchResult,
};
