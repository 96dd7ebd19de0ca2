//! Intent labels, extracted parameters and the keyword fallback.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Closed set of things a message can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Weather,
    Stock,
    News,
    Image,
    Places,
    Meme,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Weather => "weather",
            Intent::Stock => "stock",
            Intent::News => "news",
            Intent::Image => "image",
            Intent::Places => "places",
            Intent::Meme => "meme",
            Intent::General => "general",
        }
    }

    /// Parse a label as the model writes it (`weather`, `[Weather]`, `"stock"`).
    pub fn from_label(label: &str) -> Option<Self> {
        let cleaned = label
            .trim()
            .trim_matches(|c: char| matches!(c, '[' | ']' | '"' | '\'' | '*' | '`' | '.'))
            .trim()
            .to_lowercase();

        match cleaned.as_str() {
            "weather" => Some(Intent::Weather),
            "stock" | "stocks" => Some(Intent::Stock),
            "news" => Some(Intent::News),
            "image" => Some(Intent::Image),
            "places" | "place" => Some(Intent::Places),
            "meme" => Some(Intent::Meme),
            "general" => Some(Intent::General),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat key/value parameters pulled out of a message.
pub type Parameters = BTreeMap<String, String>;

/// What the extractor made of one message.
///
/// `parameters` is `None` rather than an empty map when nothing was extracted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntentResult {
    pub intent: Option<Intent>,
    pub parameters: Option<Parameters>,
}

impl IntentResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(intent: Intent, parameters: Option<Parameters>) -> Self {
        Self {
            intent: Some(intent),
            parameters: parameters.filter(|p| !p.is_empty()),
        }
    }
}

/// A vocabulary that routes a message to an intent when extraction fails.
///
/// When several rules match, the highest priority wins; equal priorities resolve to
/// the rule listed first.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub intent: Intent,
    pub priority: u8,
    pattern: Regex,
}

impl KeywordRule {
    pub fn new<S: AsRef<str>>(intent: Intent, priority: u8, keywords: &[S]) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = keywords
            .iter()
            .map(|k| regex::escape(k.as_ref().trim()))
            .filter(|k| !k.is_empty())
            .collect();
        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))?;
        Ok(Self { intent, priority, pattern })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Built-in rules. Meme outranks image: "create"/"generate" show up in meme requests
/// too, and "meme" is the more specific signal.
pub fn default_keyword_rules() -> Vec<KeywordRule> {
    let table: [(Intent, u8, &[&str]); 6] = [
        (Intent::Meme, 30, &["meme", "memes"]),
        (
            Intent::Image,
            20,
            &["image", "images", "picture", "pictures", "photo", "draw", "generate", "create"],
        ),
        (
            Intent::Places,
            10,
            &["restaurant", "restaurants", "cafe", "cafes", "bar", "bars", "pub", "pubs", "near me", "nearby"],
        ),
        (Intent::Weather, 10, &["weather", "temperature", "forecast"]),
        (Intent::Stock, 10, &["stock", "stocks", "share price", "ticker"]),
        (Intent::News, 10, &["news", "headlines"]),
    ];

    table
        .into_iter()
        .filter_map(|(intent, priority, words)| KeywordRule::new(intent, priority, words).ok())
        .collect()
}

/// Pick an intent from keywords alone.
pub fn keyword_fallback(text: &str, rules: &[KeywordRule]) -> Option<Intent> {
    rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.matches(text))
        .max_by_key(|(idx, rule)| (rule.priority, Reverse(*idx)))
        .map(|(_, rule)| rule.intent)
}
