//! TOML configuration file loading
//!
//! Supports `~/.config/nudge/config.toml` (or `$NUDGE_CONFIG`) as a persistent
//! config source. All fields are optional; the file is a partial overlay on
//! top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NudgeConfigFile {
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Silence window and polling
    #[serde(default)]
    pub proactive: ProactiveFileConfig,

    #[serde(default)]
    pub history: HistoryFileConfig,

    /// Typing delay
    #[serde(default)]
    pub pacing: PacingFileConfig,

    #[serde(default)]
    pub prompt: PromptFileConfig,

    #[serde(default)]
    pub telegram: TelegramFileConfig,

    /// Name declension service
    #[serde(default)]
    pub inflection: InflectionFileConfig,

    #[serde(default)]
    pub server: ServerFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,
    /// Base URL of an OpenAI-compatible API
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProactiveFileConfig {
    pub silence_min_secs: Option<u64>,
    pub silence_max_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryFileConfig {
    /// Character budget for stored history
    pub max_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PacingFileConfig {
    pub min_ms: Option<u64>,
    pub max_ms: Option<u64>,
    pub ms_per_char: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PromptFileConfig {
    pub character_prompt: Option<String>,
    /// Appended when the user's name is known; supports name placeholders
    pub name_addendum: Option<String>,
    pub reengage_prompt: Option<String>,
    pub style_exemplars: Option<bool>,
    /// Persona used when no tone keyword matches
    pub default_persona: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TelegramFileConfig {
    pub bot_token: Option<String>,
    /// "webhook" or "polling"
    pub mode: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InflectionFileConfig {
    pub enabled: Option<bool>,
    pub url: Option<String>,
    pub token: Option<String>,
    pub cache_ttl_secs: Option<u64>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,
}

/// Parse a config file at `path`
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid config TOML
pub fn load_from_path(path: &Path) -> Result<NudgeConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load the TOML config file from `$NUDGE_CONFIG` or the standard path
///
/// Returns `NudgeConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> NudgeConfigFile {
    let Some(path) = std::env::var_os("NUDGE_CONFIG")
        .map(PathBuf::from)
        .or_else(config_file_path)
    else {
        return NudgeConfigFile::default();
    };

    if !path.exists() {
        return NudgeConfigFile::default();
    }

    match load_from_path(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            NudgeConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/nudge/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("nudge").join("config.toml"))
}
