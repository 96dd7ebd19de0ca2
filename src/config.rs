use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::intent::{default_keyword_rules, Intent, KeywordRule};

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file '{}': {source}", path.display())]
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    #[error("failed to parse config file '{}': {source}", path.display())]
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Keyword rule could not be compiled.
    #[error("invalid keyword rule for '{intent}': {source}")]
    InvalidRegex { intent: String, source: regex::Error },
    /// Validation error.
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Deserialize)]
struct KeywordRuleFile {
    intent: String,
    #[serde(default)]
    priority: u8,
    keywords: Vec<String>,
}

#[derive(Deserialize)]
struct ConfigFile {
    telegram_bot_token: String,
    /// Public URL Telegram should post updates to. Registered at startup when set.
    webhook_url: Option<String>,
    /// Address the webhook server binds to (default 0.0.0.0:8000).
    bind_address: Option<String>,
    #[serde(default)]
    gemini_api_key: String,
    gemini_model: Option<String>,
    #[serde(default)]
    weather_api_key: String,
    #[serde(default)]
    news_api_key: String,
    /// Country for top headlines (default "in").
    news_country: Option<String>,
    #[serde(default)]
    stability_api_key: String,
    #[serde(default)]
    google_places_api_key: String,
    imgflip_username: Option<String>,
    imgflip_password: Option<String>,
    /// Chat that receives WARN/ERROR log lines.
    log_chat_id: Option<i64>,
    /// Directory for the database and logs. Defaults to current directory.
    data_dir: Option<String>,
    /// Path to Whisper model file (.bin) for voice transcription.
    whisper_model_path: Option<String>,
    /// Image sent with greetings and welcomes. Defaults to `<data_dir>/welcome.jpg`.
    welcome_image: Option<String>,
    /// Persona prompt override.
    personality: Option<String>,
    #[serde(default = "default_history_limit")]
    history_limit: usize,
    #[serde(default = "default_history_entry_chars")]
    history_entry_chars: usize,
    /// Keyword fallback rules. Replaces the built-in set when non-empty.
    #[serde(default)]
    keyword_rules: Vec<KeywordRuleFile>,
}

fn default_history_limit() -> usize {
    3
}

fn default_history_entry_chars() -> usize {
    100
}

pub struct Config {
    pub config_path: PathBuf,
    pub telegram_bot_token: String,
    pub webhook_url: Option<String>,
    pub bind_address: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub weather_api_key: String,
    pub news_api_key: String,
    pub news_country: String,
    pub stability_api_key: String,
    pub google_places_api_key: String,
    pub imgflip_username: Option<String>,
    pub imgflip_password: Option<String>,
    pub log_chat_id: Option<i64>,
    pub data_dir: PathBuf,
    pub whisper_model_path: Option<PathBuf>,
    pub welcome_image: PathBuf,
    pub personality: Option<String>,
    /// How many past exchanges ground the general conversation.
    pub history_limit: usize,
    /// Per-entry character cap for those exchanges.
    pub history_entry_chars: usize,
    pub keyword_rules: Vec<KeywordRule>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }
        if file.history_entry_chars == 0 {
            return Err(ConfigError::Validation("history_entry_chars must be positive".into()));
        }

        let keyword_rules = if file.keyword_rules.is_empty() {
            default_keyword_rules()
        } else {
            file.keyword_rules
                .into_iter()
                .map(compile_rule)
                .collect::<Result<Vec<_>, _>>()?
        };

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let welcome_image = file
            .welcome_image
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("welcome.jpg"));

        Ok(Self {
            config_path,
            telegram_bot_token: file.telegram_bot_token,
            webhook_url: file.webhook_url.filter(|u| !u.is_empty()),
            bind_address: file.bind_address.unwrap_or_else(|| "0.0.0.0:8000".to_string()),
            gemini_api_key: file.gemini_api_key,
            gemini_model: file.gemini_model.unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            weather_api_key: file.weather_api_key,
            news_api_key: file.news_api_key,
            news_country: file.news_country.unwrap_or_else(|| "in".to_string()),
            stability_api_key: file.stability_api_key,
            google_places_api_key: file.google_places_api_key,
            imgflip_username: file.imgflip_username,
            imgflip_password: file.imgflip_password,
            log_chat_id: file.log_chat_id,
            data_dir,
            whisper_model_path: file.whisper_model_path.map(PathBuf::from),
            welcome_image,
            personality: file.personality,
            history_limit: file.history_limit,
            history_entry_chars: file.history_entry_chars,
            keyword_rules,
        })
    }
}

fn compile_rule(rule: KeywordRuleFile) -> Result<KeywordRule, ConfigError> {
    let intent = Intent::from_label(&rule.intent)
        .filter(|i| *i != Intent::General)
        .ok_or_else(|| ConfigError::Validation(format!("unknown keyword rule intent '{}'", rule.intent)))?;
    if rule.keywords.iter().all(|k| k.trim().is_empty()) {
        return Err(ConfigError::Validation(format!("keyword rule for '{}' has no keywords", rule.intent)));
    }
    KeywordRule::new(intent, rule.priority, &rule.keywords)
        .map_err(|e| ConfigError::InvalidRegex { intent: rule.intent, source: e })
}
