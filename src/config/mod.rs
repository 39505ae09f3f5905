//! Configuration management for the nudge gateway
//!
//! Values are layered env > TOML file > defaults. Secrets are wrapped in
//! [`SecretString`] as soon as they are read.

pub mod file;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::agent::{PacingConfig, REENGAGE_PROMPT};
use crate::context::PromptConfig;
use crate::persona::Persona;
use crate::{Error, Result};

use file::NudgeConfigFile;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_INFLECTION_URL: &str = "https://ws3.morpher.ru";
const DEFAULT_PORT: u16 = 8080;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub proactive: ProactiveConfig,
    /// Character budget for stored and replayed history
    pub max_history_chars: usize,
    pub pacing: PacingConfig,
    pub prompt: PromptConfig,
    /// Hidden instruction used as the new turn of a proactive ping
    pub reengage_prompt: String,
    /// Persona applied when no tone keyword matches
    pub default_persona: Persona,
    pub telegram: TelegramConfig,
    pub inflection: InflectionConfig,
    /// HTTP API port
    pub port: u16,
}

/// OpenAI-compatible text generation settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub api_url: String,
    /// `None` leaves the gateway answering with fallbacks only
    pub api_key: Option<SecretString>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Silence window and scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProactiveConfig {
    pub silence_min: Duration,
    pub silence_max: Duration,
    pub poll_interval: Duration,
}

impl Default for ProactiveConfig {
    fn default() -> Self {
        Self {
            silence_min: Duration::from_secs(20 * 60),
            silence_max: Duration::from_secs(2 * 60 * 60),
            poll_interval: Duration::from_secs(30),
        }
    }
}

/// How Telegram updates reach the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TelegramMode {
    /// Telegram POSTs updates to `/api/webhooks/telegram`
    #[default]
    Webhook,
    /// The gateway long-polls `getUpdates`
    Polling,
}

impl FromStr for TelegramMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webhook" => Ok(Self::Webhook),
            "polling" | "poll" => Ok(Self::Polling),
            other => Err(Error::Config(format!(
                "unknown telegram mode {other:?} (expected webhook or polling)"
            ))),
        }
    }
}

impl fmt::Display for TelegramMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Webhook => "webhook",
            Self::Polling => "polling",
        })
    }
}

/// Telegram channel settings
#[derive(Debug, Clone, Default)]
pub struct TelegramConfig {
    /// Without a token replies are only logged
    pub bot_token: Option<SecretString>,
    pub mode: TelegramMode,
    /// Public URL registered by `nudge set-webhook`
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<SecretString>,
}

/// Name declension service settings
#[derive(Debug, Clone)]
pub struct InflectionConfig {
    pub enabled: bool,
    pub url: String,
    pub token: Option<SecretString>,
    pub cache_ttl: Duration,
}

impl Default for InflectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: DEFAULT_INFLECTION_URL.to_string(),
            token: None,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl Config {
    /// Load configuration from the process environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if an environment value cannot be parsed or the result fails validation
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Layer `env` over the parsed file over defaults, then validate
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be parsed or the result fails validation
    pub fn resolve(fc: NudgeConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let llm = LlmConfig {
            model: env("NUDGE_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_url: env("NUDGE_LLM_API_URL")
                .or(fc.llm.api_url)
                .unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string()),
            api_key: env("NUDGE_LLM_API_KEY")
                .or_else(|| env("OPENAI_API_KEY"))
                .or(fc.llm.api_key)
                .map(SecretString::from),
            max_tokens: parse_env(&env, "NUDGE_LLM_MAX_TOKENS")?
                .or(fc.llm.max_tokens)
                .or(Some(512)),
            temperature: parse_env(&env, "NUDGE_LLM_TEMPERATURE")?
                .or(fc.llm.temperature)
                .or(Some(0.9)),
        };

        let defaults = ProactiveConfig::default();
        let proactive = ProactiveConfig {
            silence_min: parse_env(&env, "NUDGE_SILENCE_MIN_SECS")?
                .or(fc.proactive.silence_min_secs)
                .map_or(defaults.silence_min, Duration::from_secs),
            silence_max: parse_env(&env, "NUDGE_SILENCE_MAX_SECS")?
                .or(fc.proactive.silence_max_secs)
                .map_or(defaults.silence_max, Duration::from_secs),
            poll_interval: parse_env(&env, "NUDGE_POLL_INTERVAL_SECS")?
                .or(fc.proactive.poll_interval_secs)
                .map_or(defaults.poll_interval, Duration::from_secs),
        };

        let defaults = PacingConfig::default();
        let pacing = PacingConfig {
            min: parse_env(&env, "NUDGE_PACING_MIN_MS")?
                .or(fc.pacing.min_ms)
                .map_or(defaults.min, Duration::from_millis),
            max: parse_env(&env, "NUDGE_PACING_MAX_MS")?
                .or(fc.pacing.max_ms)
                .map_or(defaults.max, Duration::from_millis),
            per_char: parse_env(&env, "NUDGE_PACING_MS_PER_CHAR")?
                .or(fc.pacing.ms_per_char)
                .map_or(defaults.per_char, Duration::from_millis),
        };

        let defaults = PromptConfig::default();
        let max_history_chars = parse_env(&env, "NUDGE_HISTORY_MAX_CHARS")?
            .or(fc.history.max_chars)
            .unwrap_or(defaults.max_history_chars);
        let prompt = PromptConfig {
            character_prompt: env("NUDGE_CHARACTER_PROMPT")
                .or(fc.prompt.character_prompt)
                .unwrap_or(defaults.character_prompt),
            name_addendum: fc.prompt.name_addendum.unwrap_or(defaults.name_addendum),
            style_exemplars: parse_env_bool(&env, "NUDGE_STYLE_EXEMPLARS")?
                .or(fc.prompt.style_exemplars)
                .unwrap_or(defaults.style_exemplars),
            max_history_chars,
        };

        let default_persona = env("NUDGE_DEFAULT_PERSONA")
            .or(fc.prompt.default_persona)
            .map(|tag| {
                tag.parse::<Persona>()
                    .map_err(|_| Error::Config(format!("unknown default persona {tag:?}")))
            })
            .transpose()?
            .unwrap_or_default();

        let telegram = TelegramConfig {
            bot_token: env("TELEGRAM_BOT_TOKEN")
                .or(fc.telegram.bot_token)
                .map(SecretString::from),
            mode: env("NUDGE_TELEGRAM_MODE")
                .or(fc.telegram.mode)
                .map(|m| m.parse::<TelegramMode>())
                .transpose()?
                .unwrap_or_default(),
            webhook_url: env("NUDGE_WEBHOOK_URL").or(fc.telegram.webhook_url),
            webhook_secret: env("NUDGE_WEBHOOK_SECRET")
                .or(fc.telegram.webhook_secret)
                .map(SecretString::from),
        };

        let defaults = InflectionConfig::default();
        let inflection = InflectionConfig {
            enabled: parse_env_bool(&env, "NUDGE_INFLECTION_ENABLED")?
                .or(fc.inflection.enabled)
                .unwrap_or(defaults.enabled),
            url: env("NUDGE_INFLECTION_URL")
                .or(fc.inflection.url)
                .unwrap_or(defaults.url),
            token: env("NUDGE_INFLECTION_TOKEN")
                .or(fc.inflection.token)
                .map(SecretString::from),
            cache_ttl: fc
                .inflection
                .cache_ttl_secs
                .map_or(defaults.cache_ttl, Duration::from_secs),
        };

        let config = Self {
            llm,
            proactive,
            max_history_chars,
            pacing,
            prompt,
            reengage_prompt: fc
                .prompt
                .reengage_prompt
                .unwrap_or_else(|| REENGAGE_PROMPT.to_string()),
            default_persona,
            telegram,
            inflection,
            port: parse_env(&env, "NUDGE_PORT")?
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would make the scheduler or pacing misbehave
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first violation
    pub fn validate(&self) -> Result<()> {
        let p = &self.proactive;
        if p.silence_min > p.silence_max {
            return Err(Error::Config(format!(
                "silence window minimum ({}s) exceeds maximum ({}s)",
                p.silence_min.as_secs(),
                p.silence_max.as_secs()
            )));
        }
        if p.poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be non-zero".to_string()));
        }
        if self.pacing.min > self.pacing.max {
            return Err(Error::Config(format!(
                "pacing minimum ({}ms) exceeds maximum ({}ms)",
                self.pacing.min.as_millis(),
                self.pacing.max.as_millis()
            )));
        }
        if self.max_history_chars == 0 {
            return Err(Error::Config("history budget must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn parse_env<T>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}

fn parse_env_bool(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    env(key)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::Config(format!("{key}={raw:?}: expected a boolean"))),
        })
        .transpose()
}
