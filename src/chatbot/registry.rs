//! Capability table and the registry that invokes handlers.
//!
//! Each capability declares which extracted parameter feeds which handler argument.
//! The table is the single source for argument mapping, clarification hints and the
//! schemas served on `/capabilities`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::chatbot::capabilities::{MemeReport, PlacesReport};
use crate::intent::{Intent, Parameters};

/// One row of a capability's argument table.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    /// Key the extractor produces.
    pub extracted: &'static str,
    /// Argument name the handler reads.
    pub argument: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// How a successful handler result becomes reply text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcess {
    /// Handler output goes to the user as-is.
    Verbatim,
    /// A second model call turns raw data into a conversational answer.
    Rephrase,
    Image,
    Places,
    Meme,
}

#[derive(Debug)]
pub struct CapabilitySpec {
    pub intent: Intent,
    pub function_name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    pub post: PostProcess,
    /// Generic name used in apologies ("the weather service").
    pub noun: &'static str,
    /// What to ask for when required parameters are missing.
    pub clarify_hint: &'static str,
}

const fn param(extracted: &'static str, argument: &'static str, required: bool, description: &'static str) -> ParamSpec {
    ParamSpec { extracted, argument, required, description }
}

pub static CAPABILITIES: &[CapabilitySpec] = &[
    CapabilitySpec {
        intent: Intent::Weather,
        function_name: "get_weather",
        description: "Get current weather information for a specific city",
        params: &[param("city", "city_name", true, "Name of the city to get weather for")],
        post: PostProcess::Verbatim,
        noun: "weather service",
        clarify_hint: "which city to check the weather for",
    },
    CapabilitySpec {
        intent: Intent::Stock,
        function_name: "get_stock_price",
        description: "Get current stock price and information for a stock symbol",
        params: &[param("symbol", "symbol", true, "Stock symbol (e.g., AAPL, GOOGL, TSLA)")],
        post: PostProcess::Rephrase,
        noun: "stock service",
        clarify_hint: "which stock symbol to look up (for example AAPL or TSLA)",
    },
    CapabilitySpec {
        intent: Intent::News,
        function_name: "get_news",
        description: "Get latest news headlines or search for specific news topics",
        params: &[param("query", "query", true, "News topic to search for, or 'latest' for top headlines")],
        post: PostProcess::Rephrase,
        noun: "news service",
        clarify_hint: "which news topic to search for (or just the latest headlines)",
    },
    CapabilitySpec {
        intent: Intent::Image,
        function_name: "generate_image",
        description: "Generate an image based on a text description",
        params: &[param("prompt", "prompt", true, "Description of the image to generate")],
        post: PostProcess::Image,
        noun: "image generator",
        clarify_hint: "what the image should show",
    },
    CapabilitySpec {
        intent: Intent::Places,
        function_name: "get_places_nearby",
        description: "Find restaurants, bars, cafes and other places near a location",
        params: &[
            param("lat", "lat", true, "Latitude of the search center"),
            param("lon", "lon", true, "Longitude of the search center"),
            param("query", "query", false, "Kind of place to look for (default: restaurants)"),
            param("page", "page", false, "Result page, starting at 1"),
        ],
        post: PostProcess::Places,
        noun: "places search",
        clarify_hint: "what kind of place to look for",
    },
    CapabilitySpec {
        intent: Intent::Meme,
        function_name: "generate_meme",
        description: "Generate a meme with custom top and bottom text",
        params: &[
            param("top_text", "top_text", false, "Text at the top of the meme"),
            param("bottom_text", "bottom_text", false, "Text at the bottom of the meme"),
            param("template", "template", false, "Template name or topic to search for"),
        ],
        post: PostProcess::Meme,
        noun: "meme generator",
        clarify_hint: "the top and bottom text, or a topic for the meme",
    },
];

pub fn spec_for(intent: Intent) -> Option<&'static CapabilitySpec> {
    CAPABILITIES.iter().find(|c| c.intent == intent)
}

pub fn spec_by_name(function_name: &str) -> Option<&'static CapabilitySpec> {
    CAPABILITIES.iter().find(|c| c.function_name == function_name)
}

/// Handler arguments, keyed by the handler's own names.
pub type Arguments = BTreeMap<&'static str, String>;

#[derive(Debug, Error, PartialEq)]
pub enum ArgumentError {
    #[error("{function} needs '{extracted}'")]
    MissingRequired {
        function: &'static str,
        extracted: &'static str,
    },
}

impl CapabilitySpec {
    /// Rename extracted parameters to handler arguments. Blank values count as missing.
    /// A value already under the handler's name is accepted too.
    pub fn remap(&self, params: &Parameters) -> Result<Arguments, ArgumentError> {
        let mut args = Arguments::new();
        for p in self.params {
            let value = [p.extracted, p.argument]
                .into_iter()
                .filter_map(|key| params.get(key))
                .map(|v| v.trim())
                .find(|v| !v.is_empty());

            match value {
                Some(v) => {
                    args.insert(p.argument, v.to_string());
                }
                None if p.required => {
                    return Err(ArgumentError::MissingRequired {
                        function: self.function_name,
                        extracted: p.extracted,
                    });
                }
                None => {}
            }
        }
        Ok(args)
    }

    pub fn has_required(&self) -> bool {
        self.params.iter().any(|p| p.required)
    }

    /// JSON-schema style declaration, for documentation only.
    pub fn declaration(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.argument.to_string(), json!({ "type": "string", "description": p.description })))
            .collect();
        let required: Vec<&str> = self.params.iter().filter(|p| p.required).map(|p| p.argument).collect();

        json!({
            "name": self.function_name,
            "intent": self.intent,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        })
    }
}

/// What a handler hands back on success.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Image { bytes: Vec<u8>, prompt: String },
    Places(PlacesReport),
    Meme(MemeReport),
}

#[async_trait]
pub trait Capability: Send + Sync {
    async fn call(&self, args: &Arguments) -> Result<Payload, String>;
}

/// Read an argument that the table guarantees for required params.
pub fn arg<'a>(args: &'a Arguments, name: &str) -> Result<&'a str, String> {
    args.get(name)
        .map(String::as_str)
        .ok_or_else(|| format!("missing argument '{name}'"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResult {
    pub function_name: String,
    pub result: Payload,
    pub success: bool,
}

impl HandlerResult {
    fn failure(function_name: &str, message: String) -> Self {
        Self {
            function_name: function_name.to_string(),
            result: Payload::Text(message),
            success: false,
        }
    }
}

#[derive(Default)]
pub struct Registry {
    handlers: HashMap<&'static str, Arc<dyn Capability>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to the capability declared for `intent`.
    pub fn register(&mut self, intent: Intent, handler: Arc<dyn Capability>) {
        match spec_for(intent) {
            Some(spec) => {
                self.handlers.insert(spec.function_name, handler);
            }
            None => warn!("No capability declared for intent {intent}, handler ignored"),
        }
    }

    pub fn function_names(&self) -> Vec<&'static str> {
        CAPABILITIES
            .iter()
            .map(|c| c.function_name)
            .filter(|name| self.handlers.contains_key(name))
            .collect()
    }

    pub fn declarations(&self) -> Vec<Value> {
        CAPABILITIES
            .iter()
            .filter(|c| self.handlers.contains_key(c.function_name))
            .map(CapabilitySpec::declaration)
            .collect()
    }

    /// Run a handler. Errors and panics inside it become a failed result.
    pub async fn invoke(&self, function_name: &str, args: &Arguments) -> HandlerResult {
        let Some(handler) = self.handlers.get(function_name).cloned() else {
            warn!("Unknown function requested: {function_name}");
            return HandlerResult::failure(function_name, format!("Unknown function: {function_name}"));
        };

        info!("🔧 Calling {function_name} with {:?}", args);
        let owned = args.clone();
        let outcome = tokio::spawn(async move { handler.call(&owned).await }).await;

        match outcome {
            Ok(Ok(result)) => HandlerResult {
                function_name: function_name.to_string(),
                result,
                success: true,
            },
            Ok(Err(e)) => {
                warn!("🔧 {function_name} failed: {e}");
                HandlerResult::failure(function_name, format!("Error calling {function_name}: {e}"))
            }
            Err(e) => {
                warn!("🔧 {function_name} aborted: {e}");
                HandlerResult::failure(function_name, format!("Error calling {function_name}: handler crashed"))
            }
        }
    }
}
