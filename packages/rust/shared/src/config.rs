//! Application configuration for the lead magnet generator.
//!
//! User config lives at `~/.leadmagnet/leadmagnet.toml`.
//! Environment variables override config file values, which override defaults.
//! API keys are never stored in the file, only the names of the variables
//! that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LeadMagnetError, Result};
use crate::settings::GenerationSettings;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "leadmagnet.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".leadmagnet";

/// File holding the last used generation settings.
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Lowest output token budget accepted for the language model.
pub const MIN_OUTPUT_TOKENS: u32 = 500;

// ---------------------------------------------------------------------------
// Config structs (matching leadmagnet.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language model provider settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Search provider settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Default generation settings.
    #[serde(default)]
    pub generation: GenerationSettings,

    /// Where finished documents are written.
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[llm]` section: an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`. Empty means "take it from
    /// `LLM_BASE_URL`".
    #[serde(default)]
    pub base_url: String,

    /// Model identifier. Empty means "take it from `LLM_MODEL`".
    #[serde(default)]
    pub model: String,

    /// Name of the env var holding the API key.
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    /// Upper bound on generated tokens per call.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Thinking budget for models that support one; 0 disables it.
    #[serde(default)]
    pub reasoning_budget: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            model: String::new(),
            api_key_env: default_llm_key_env(),
            max_output_tokens: default_max_output_tokens(),
            reasoning_budget: 0,
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_key_env() -> String {
    "LLM_API_KEY".into()
}
fn default_max_output_tokens() -> u32 {
    12_000
}
fn default_llm_timeout() -> u64 {
    120
}

/// `[search]` section: Tavily search API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_url")]
    pub base_url: String,

    /// Name of the env var holding the API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Results requested per query.
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// Tavily search depth: "basic" or "advanced".
    #[serde(default = "default_search_depth")]
    pub search_depth: String,

    /// Ask the provider for the full page text of each hit.
    #[serde(default = "default_true")]
    pub include_raw_content: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_url(),
            api_key_env: default_search_key_env(),
            max_results: default_max_results(),
            search_depth: default_search_depth(),
            include_raw_content: true,
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_url() -> String {
    "https://api.tavily.com".into()
}
fn default_search_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn default_max_results() -> u32 {
    5
}
fn default_search_depth() -> String {
    "basic".into()
}
fn default_true() -> bool {
    true
}
fn default_search_timeout() -> u64 {
    30
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for drafts and final documents.
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// File name prefix for generated documents.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            prefix: default_prefix(),
        }
    }
}

fn default_output_dir() -> String {
    "outputs".into()
}
fn default_prefix() -> String {
    "lead_magnet".into()
}

// ---------------------------------------------------------------------------
// Resolved credentials
// ---------------------------------------------------------------------------

/// Secrets and endpoints resolved from the environment at startup.
#[derive(Clone)]
pub struct Credentials {
    pub llm_api_key: String,
    pub search_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("llm_api_key", &"***")
            .field("search_api_key", &"***")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.leadmagnet/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LeadMagnetError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.leadmagnet/leadmagnet.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Get the path to the saved settings (`~/.leadmagnet/settings.json`).
pub fn settings_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(SETTINGS_FILE_NAME))
}

/// Load the application config from disk and apply environment overrides.
/// Returns defaults (plus overrides) if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    let mut config = if path.exists() {
        load_config_from(&path)?
    } else {
        tracing::debug!(?path, "config file not found, using defaults");
        AppConfig::default()
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    Ok(config)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LeadMagnetError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        LeadMagnetError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Apply `LLM_BASE_URL`, `LLM_MODEL` and `LLM_MAX_OUTPUT_TOKENS` overrides.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(base_url) = present("LLM_BASE_URL") {
        config.llm.base_url = base_url;
    }
    if let Some(model) = present("LLM_MODEL") {
        config.llm.model = model;
    }
    if let Some(raw) = present("LLM_MAX_OUTPUT_TOKENS") {
        config.llm.max_output_tokens = raw.trim().parse().map_err(|_| {
            LeadMagnetError::config("LLM_MAX_OUTPUT_TOKENS must be an integer")
        })?;
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LeadMagnetError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LeadMagnetError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LeadMagnetError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check the config is usable and resolve the API keys.
///
/// Every missing required value is reported in a single error.
pub fn validate_config<F>(config: &AppConfig, lookup: F) -> Result<Credentials>
where
    F: Fn(&str) -> Option<String>,
{
    let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let mut missing = Vec::new();
    let llm_api_key = present(&config.llm.api_key_env);
    if llm_api_key.is_none() {
        missing.push(config.llm.api_key_env.clone());
    }
    if config.llm.base_url.trim().is_empty() {
        missing.push("LLM_BASE_URL".to_string());
    }
    if config.llm.model.trim().is_empty() {
        missing.push("LLM_MODEL".to_string());
    }
    let search_api_key = present(&config.search.api_key_env);
    if search_api_key.is_none() {
        missing.push(config.search.api_key_env.clone());
    }

    if !missing.is_empty() {
        return Err(LeadMagnetError::config(format!(
            "Missing required environment variables: {}",
            missing.join(", ")
        )));
    }

    Url::parse(&config.llm.base_url)
        .map_err(|e| LeadMagnetError::config(format!("invalid LLM base URL: {e}")))?;
    Url::parse(&config.search.base_url)
        .map_err(|e| LeadMagnetError::config(format!("invalid search base URL: {e}")))?;

    if config.llm.max_output_tokens < MIN_OUTPUT_TOKENS {
        return Err(LeadMagnetError::config(format!(
            "LLM_MAX_OUTPUT_TOKENS must be >= {MIN_OUTPUT_TOKENS}"
        )));
    }

    Ok(Credentials {
        llm_api_key: llm_api_key.unwrap_or_default(),
        search_api_key: search_api_key.unwrap_or_default(),
    })
}
