//! Per-run generation settings.
//!
//! Values come from user input and are clamped into range on construction;
//! out-of-range input is coerced, never rejected. The last used settings
//! can be saved to and loaded from a JSON file.

use std::ops::RangeInclusive;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LeadMagnetError, Result};

pub const WORDS_PER_CHAPTER_RANGE: RangeInclusive<u32> = 100..=1000;
pub const CHAPTER_COUNT_RANGE: RangeInclusive<u32> = 1..=10;
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=1.0;

/// Immutable settings for one generation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "SettingsInput")]
pub struct GenerationSettings {
    words_per_chapter: u32,
    chapter_count: u32,
    temperature: f32,
    editor_temperature: f32,
    keep_links: bool,
    enable_section_editors: bool,
}

/// Unclamped settings as entered by the user.
///
/// Every field is optional when deserialized; missing fields take the
/// defaults of [`GenerationSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SettingsInput {
    pub words_per_chapter: i64,
    pub chapter_count: i64,
    pub temperature: f32,
    pub editor_temperature: f32,
    pub keep_links: bool,
    pub enable_section_editors: bool,
}

impl Default for SettingsInput {
    fn default() -> Self {
        Self {
            words_per_chapter: 300,
            chapter_count: 5,
            temperature: 0.7,
            editor_temperature: 0.2,
            keep_links: true,
            enable_section_editors: true,
        }
    }
}

impl From<SettingsInput> for GenerationSettings {
    fn from(input: SettingsInput) -> Self {
        Self {
            words_per_chapter: clamp_int(input.words_per_chapter, WORDS_PER_CHAPTER_RANGE),
            chapter_count: clamp_int(input.chapter_count, CHAPTER_COUNT_RANGE),
            temperature: clamp_temperature(input.temperature),
            editor_temperature: clamp_temperature(input.editor_temperature),
            keep_links: input.keep_links,
            enable_section_editors: input.enable_section_editors,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        SettingsInput::default().into()
    }
}

impl GenerationSettings {
    /// Build settings from raw user values, clamping each numeric field.
    pub fn new(input: SettingsInput) -> Self {
        input.into()
    }

    pub fn words_per_chapter(&self) -> u32 {
        self.words_per_chapter
    }

    pub fn chapter_count(&self) -> u32 {
        self.chapter_count
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Sampling temperature for section editors and the final polish.
    pub fn editor_temperature(&self) -> f32 {
        self.editor_temperature
    }

    /// Whether generated prose should keep Markdown source links.
    pub fn keep_links(&self) -> bool {
        self.keep_links
    }

    pub fn enable_section_editors(&self) -> bool {
        self.enable_section_editors
    }

    /// The unclamped view, useful as a base for applying overrides.
    pub fn to_input(&self) -> SettingsInput {
        SettingsInput {
            words_per_chapter: i64::from(self.words_per_chapter),
            chapter_count: i64::from(self.chapter_count),
            temperature: self.temperature,
            editor_temperature: self.editor_temperature,
            keep_links: self.keep_links,
            enable_section_editors: self.enable_section_editors,
        }
    }

    /// True if every numeric field lies inside its allowed range.
    pub fn is_within_bounds(&self) -> bool {
        WORDS_PER_CHAPTER_RANGE.contains(&self.words_per_chapter)
            && CHAPTER_COUNT_RANGE.contains(&self.chapter_count)
            && TEMPERATURE_RANGE.contains(&self.temperature)
            && TEMPERATURE_RANGE.contains(&self.editor_temperature)
    }
}

fn clamp_int(value: i64, range: RangeInclusive<u32>) -> u32 {
    let clamped = value.clamp(i64::from(*range.start()), i64::from(*range.end()));
    u32::try_from(clamped).unwrap_or(*range.start())
}

fn clamp_temperature(value: f32) -> f32 {
    if value.is_nan() {
        return *TEMPERATURE_RANGE.start();
    }
    value.clamp(*TEMPERATURE_RANGE.start(), *TEMPERATURE_RANGE.end())
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Load saved settings, falling back to defaults when the file is missing
/// or cannot be parsed.
pub fn load_settings(path: &Path) -> GenerationSettings {
    if !path.exists() {
        debug!(?path, "settings file not found, using defaults");
        return GenerationSettings::default();
    }

    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| {
            serde_json::from_str::<GenerationSettings>(&content).map_err(|e| e.to_string())
        });

    match parsed {
        Ok(settings) => settings,
        Err(e) => {
            warn!(?path, error = %e, "failed to load settings, using defaults");
            GenerationSettings::default()
        }
    }
}

/// Save settings as pretty JSON, creating parent directories.
pub fn save_settings(settings: &GenerationSettings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LeadMagnetError::io(parent, e))?;
    }

    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| LeadMagnetError::Serialization(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| LeadMagnetError::io(path, e))?;

    debug!(?path, "saved generation settings");
    Ok(())
}
