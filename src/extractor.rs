//! Turns free text into an intent label and flat parameters via one model call.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::intent::{Intent, IntentResult, Parameters};
use crate::llm::LanguageModel;

#[async_trait]
pub trait IntentExtractor: Send + Sync {
    /// Never fails: anything unusable comes back as [`IntentResult::none`].
    async fn extract(&self, text: &str) -> IntentResult;
}

pub struct LlmExtractor {
    model: Arc<dyn LanguageModel>,
}

impl LlmExtractor {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl IntentExtractor for LlmExtractor {
    async fn extract(&self, text: &str) -> IntentResult {
        let response = match self.model.generate(&extraction_prompt(text)).await {
            Ok(r) => r,
            Err(e) => {
                warn!("🤖 Intent extraction failed: {e}");
                return IntentResult::none();
            }
        };

        let result = parse_extraction(&response);
        info!(
            "🎯 Extracted intent: {:?}, parameters: {:?}",
            result.intent.map(|i| i.as_str()),
            result.parameters
        );
        result
    }
}

pub fn extraction_prompt(message: &str) -> String {
    format!(
        r#"Analyze this user message and determine:
1. What type of information they want (weather, stock, news, image, meme, places, or general conversation)
2. What specific parameters they need (city name, stock symbol, news topic, image prompt, meme text, place type)

Examples:
- "Weather in Mumbai" → intent: weather, params: {{"city": "Mumbai"}}
- "Stock price of AAPL" → intent: stock, params: {{"symbol": "AAPL"}}
- "Latest news" → intent: news, params: {{"query": "general"}}
- "Technology news" → intent: news, params: {{"query": "technology"}}
- "Generate an image of a sunset" → intent: image, params: {{"prompt": "a beautiful sunset over mountains"}}
- "Create a picture of a cat" → intent: image, params: {{"prompt": "a cute cat playing with a ball"}}
- "Can you generate image for me?" → intent: image, params: null
- "Make me a picture" → intent: image, params: null
- "Make a meme with top: 'When you finally fix a bug' bottom: 'But then another one appears'" → intent: meme, params: {{"top_text": "When you finally fix a bug", "bottom_text": "But then another one appears"}}
- "Generate a meme about programming" → intent: meme, params: {{"template": "programming"}}
- "Make me a meme" → intent: meme, params: null
- "Find restaurants near me" → intent: places, params: {{"query": "restaurants"}}
- "Show me bars around here" → intent: places, params: {{"query": "bars"}}
- "Show page 2 of cafes" → intent: places, params: {{"query": "cafes", "page": "2"}}
- "cafes page 3" → intent: places, params: {{"query": "cafes", "page": "3"}}
- "Hello" → intent: general, params: null
- "Who made you?" → intent: general, params: null

User message: "{message}"

Respond in this exact format:
Intent: [weather/stock/news/image/meme/places/general]
Parameters: [JSON object or null]"#
    )
}

/// Parse the `Intent:` / `Parameters:` layout. Missing or unknown intent yields `none`.
pub fn parse_extraction(response: &str) -> IntentResult {
    let mut intent = None;
    let mut parameters = None;

    for raw in response.lines() {
        let line = raw.replace('*', "");
        let line = line.trim().trim_start_matches('-').trim();

        if let Some(rest) = strip_label(line, "intent:") {
            intent = Intent::from_label(rest);
        } else if let Some(rest) = strip_label(line, "parameters:") {
            parameters = parse_parameters(rest);
        }
    }

    match intent {
        Some(intent) => IntentResult::new(intent, parameters),
        None => IntentResult::none(),
    }
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if head.eq_ignore_ascii_case(label) {
        line.get(label.len()..).map(str::trim)
    } else {
        None
    }
}

/// Flat object only. JSON first, then the looser `{key: value, ...}` form models
/// sometimes write. Nested values reject the whole object.
pub fn parse_parameters(text: &str) -> Option<Parameters> {
    let text = text.trim().trim_matches('`').trim();
    if text.is_empty() || text.eq_ignore_ascii_case("null") || text.eq_ignore_ascii_case("none") {
        return None;
    }

    let params = if text.starts_with('{') && text.ends_with('}') {
        match serde_json::from_str::<serde_json::Map<String, Value>>(text) {
            Ok(map) => from_json(map)?,
            Err(_) => parse_loose(&text[1..text.len() - 1])?,
        }
    } else if text.contains(':') && !text.contains(['{', '}', '[', ']']) {
        parse_loose(text)?
    } else {
        return None;
    };

    (!params.is_empty()).then_some(params)
}

fn from_json(map: serde_json::Map<String, Value>) -> Option<Parameters> {
    let mut params = Parameters::new();
    for (key, value) in map {
        let value = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => continue,
            Value::Array(_) | Value::Object(_) => return None,
        };
        params.insert(key, value);
    }
    Some(params)
}

fn parse_loose(body: &str) -> Option<Parameters> {
    if body.contains(['{', '}', '[', ']']) {
        return None;
    }

    let mut params = Parameters::new();
    let mut last_key: Option<String> = None;

    for piece in body.split(',') {
        match piece.split_once(':') {
            Some((key, value)) => {
                let key = unquote(key);
                if key.is_empty() {
                    return None;
                }
                params.insert(key.to_string(), unquote(value).to_string());
                last_key = Some(key.to_string());
            }
            // A comma inside an unquoted value
            None => {
                let key = last_key.as_ref()?;
                let value = params.get_mut(key)?;
                let extra = unquote(piece);
                if !extra.is_empty() {
                    value.push_str(", ");
                    value.push_str(extra);
                }
            }
        }
    }
    Some(params)
}

fn unquote(s: &str) -> &str {
    s.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}
