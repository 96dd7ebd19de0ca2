//! Intent resolution and dispatch for one text message.
//!
//! Greeting short-circuit, then extraction with keyword fallback, then one of:
//! direct capability call, clarification question, location request, or general
//! conversation grounded in recent history.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::chatbot::format::{
    failure_message, format_meme_response, format_places_response, image_caption, image_reply_text,
};
use crate::chatbot::message::{Media, Reply};
use crate::chatbot::prompts::{
    canned_clarification, clarification_prompt, follow_up_prompt, general_prompt, DEFAULT_PERSONA,
    GENERAL_ERROR_TEXT, GREETING_TEXT, LOCATION_REQUEST_TEXT, WELCOME_CAPTION,
};
use crate::chatbot::registry::{spec_for, Arguments, CapabilitySpec, Payload, PostProcess, Registry};
use crate::chatbot::store::{Location, Store};
use crate::extractor::IntentExtractor;
use crate::greeting::is_greeting;
use crate::intent::{default_keyword_rules, keyword_fallback, Intent, IntentResult, KeywordRule, Parameters};
use crate::llm::LanguageModel;

/// What to do with one message once the intent is known.
#[derive(Debug)]
pub enum Decision {
    DirectCall {
        spec: &'static CapabilitySpec,
        args: Arguments,
    },
    Clarify(&'static CapabilitySpec),
    RequestLocation,
    Fallback,
}

/// Pure routing step. `stored` is the user's last shared location, if any.
pub fn decide(intent: Intent, params: Option<&Parameters>, stored: Option<&Location>) -> Decision {
    let Some(spec) = spec_for(intent) else {
        return Decision::Fallback;
    };
    let mut params = params.cloned().unwrap_or_default();

    if intent == Intent::Places && !(has_value(&params, "lat") && has_value(&params, "lon")) {
        // Never guess coordinates
        let Some(location) = stored else {
            return Decision::RequestLocation;
        };
        params.insert("lat".to_string(), location.lat.to_string());
        params.insert("lon".to_string(), location.lon.to_string());
        params
            .entry("query".to_string())
            .or_insert_with(|| "restaurants".to_string());
    }

    if params.is_empty() {
        return Decision::Clarify(spec);
    }

    match spec.remap(&params) {
        Ok(args) => Decision::DirectCall { spec, args },
        Err(e) => {
            info!("❓ {e}, asking for clarification");
            Decision::Clarify(spec)
        }
    }
}

fn has_value(params: &Parameters, key: &str) -> bool {
    params.get(key).is_some_and(|v| !v.trim().is_empty())
}

/// Dispatcher configuration.
pub struct DispatcherConfig {
    pub keyword_rules: Vec<KeywordRule>,
    pub persona: String,
    /// Past exchanges included in general conversation.
    pub history_limit: usize,
    /// Per-entry character cap for those exchanges.
    pub history_entry_chars: usize,
    pub welcome_image: PathBuf,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            keyword_rules: default_keyword_rules(),
            persona: DEFAULT_PERSONA.to_string(),
            history_limit: 3,
            history_entry_chars: 100,
            welcome_image: PathBuf::from("welcome.jpg"),
        }
    }
}

pub struct Dispatcher {
    config: DispatcherConfig,
    extractor: Arc<dyn IntentExtractor>,
    model: Arc<dyn LanguageModel>,
    registry: Arc<Registry>,
    store: Arc<dyn Store>,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        extractor: Arc<dyn IntentExtractor>,
        model: Arc<dyn LanguageModel>,
        registry: Arc<Registry>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self { config, extractor, model, registry, store }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn welcome_media(&self) -> Media {
        Media::File {
            path: self.config.welcome_image.clone(),
            caption: Some(WELCOME_CAPTION.to_string()),
        }
    }

    pub async fn extract(&self, text: &str) -> IntentResult {
        self.extractor.extract(text).await
    }

    /// Produce the reply for one text message. Never fails.
    pub async fn respond(&self, text: &str, user_id: Option<i64>) -> Reply {
        if is_greeting(text) {
            info!("👋 Detected greeting: {text}");
            let mut reply = Reply::text(GREETING_TEXT, "greeting").with_media(self.welcome_media());
            reply.function_used = Some("greeting".to_string());
            return reply;
        }

        let extracted = self.extractor.extract(text).await;
        let (intent, params) = match extracted.intent {
            Some(intent) => (intent, extracted.parameters),
            None => match keyword_fallback(text, &self.config.keyword_rules) {
                Some(intent) => {
                    info!("🔄 Keyword fallback picked {intent}");
                    (intent, None)
                }
                None => (Intent::General, None),
            },
        };

        let stored = match (intent, user_id) {
            (Intent::Places, Some(uid)) => self.store.get_user(uid).and_then(|p| p.last_location),
            _ => None,
        };

        match decide(intent, params.as_ref(), stored.as_ref()) {
            Decision::DirectCall { spec, args } => self.call(spec, &args, text).await,
            Decision::Clarify(spec) => self.clarify(spec, text).await,
            Decision::RequestLocation => {
                info!("📍 No location on file, asking for it");
                let mut reply = Reply::text(LOCATION_REQUEST_TEXT, "location_request");
                reply.function_used = Some("location_request".to_string());
                reply.request_location = true;
                reply
            }
            Decision::Fallback => self.converse(text, user_id).await,
        }
    }

    async fn call(&self, spec: &'static CapabilitySpec, args: &Arguments, user_message: &str) -> Reply {
        let name = spec.function_name;
        let result = self.registry.invoke(name, args).await;

        if !result.success {
            return Reply::from_function(failure_message(spec), name, false);
        }

        let text = match (spec.post, result.result) {
            (PostProcess::Image, Payload::Image { bytes, prompt }) => {
                return Reply::from_function(image_reply_text(&prompt), name, true).with_media(Media::Bytes {
                    data: bytes,
                    caption: Some(image_caption(&prompt)),
                });
            }
            (PostProcess::Meme, Payload::Meme(meme)) => {
                let media = Media::Url { url: meme.url.clone(), caption: Some(meme.template_name.clone()) };
                return Reply::from_function(format_meme_response(&meme), name, true).with_media(media);
            }
            (PostProcess::Places, Payload::Places(report)) => format_places_response(&report, report.page),
            (PostProcess::Rephrase, Payload::Text(raw)) => self.rephrase(user_message, name, raw).await,
            (_, Payload::Text(raw)) => raw,
            (post, other) => {
                warn!("{name} returned {other:?}, which {post:?} can't render");
                return Reply::from_function(failure_message(spec), name, false);
            }
        };

        Reply::from_function(text, name, true)
    }

    async fn rephrase(&self, user_message: &str, function_name: &str, raw: String) -> String {
        let prompt = follow_up_prompt(&self.config.persona, user_message, function_name, &raw);
        match self.model.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Rephrase failed, sending raw result: {e}");
                raw
            }
        }
    }

    async fn clarify(&self, spec: &'static CapabilitySpec, user_message: &str) -> Reply {
        info!("❓ Asking for details for {}", spec.intent);
        let prompt = clarification_prompt(&self.config.persona, spec, user_message);
        let text = match self.model.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Clarification prompt failed: {e}");
                canned_clarification(spec)
            }
        };
        Reply::text(text, "general")
    }

    async fn converse(&self, user_message: &str, user_id: Option<i64>) -> Reply {
        let (profile, history) = match user_id {
            Some(uid) => (
                self.store.get_user(uid),
                self.store.get_recent_chats(uid, self.config.history_limit),
            ),
            None => (None, Vec::new()),
        };

        let prompt = general_prompt(
            &self.config.persona,
            profile.as_ref(),
            &history,
            self.config.history_entry_chars,
            user_message,
        );

        match self.model.generate(&prompt).await {
            Ok(text) => Reply::text(text, "general"),
            Err(e) => {
                warn!("💬 General reply failed: {e}");
                let mut reply = Reply::text(GENERAL_ERROR_TEXT, "general");
                reply.success = false;
                reply
            }
        }
    }
}
