//! In-memory doubles for the trait seams, shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::chatbot::message::Media;
use crate::chatbot::registry::{Arguments, Capability, Payload};
use crate::chatbot::telegram::Messenger;
use crate::chatbot::whisper::Transcriber;
use crate::extractor::IntentExtractor;
use crate::intent::IntentResult;
use crate::llm::{self, LanguageModel};

/// Answers prompts from a queue; fails once the queue runs dry.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new<'a>(responses: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            prompts: Mutex::default(),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String, llm::Error> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| llm::Error::Api("scripted failure".to_string()))
    }
}

enum Behaviour {
    Succeed(Payload),
    Fail(String),
    Panic,
}

pub struct FakeCapability {
    behaviour: Behaviour,
    calls: Mutex<Vec<Arguments>>,
}

impl FakeCapability {
    fn with(behaviour: Behaviour) -> Self {
        Self { behaviour, calls: Mutex::default() }
    }

    pub fn text(text: &str) -> Self {
        Self::with(Behaviour::Succeed(Payload::Text(text.to_string())))
    }

    pub fn payload(payload: Payload) -> Self {
        Self::with(Behaviour::Succeed(payload))
    }

    pub fn failing(message: &str) -> Self {
        Self::with(Behaviour::Fail(message.to_string()))
    }

    pub fn panicking() -> Self {
        Self::with(Behaviour::Panic)
    }

    pub fn calls(&self) -> Vec<Arguments> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Capability for FakeCapability {
    async fn call(&self, args: &Arguments) -> Result<Payload, String> {
        self.calls.lock().unwrap().push(args.clone());
        match &self.behaviour {
            Behaviour::Succeed(payload) => Ok(payload.clone()),
            Behaviour::Fail(message) => Err(message.clone()),
            Behaviour::Panic => panic!("capability blew up"),
        }
    }
}

/// Always returns the same extraction.
pub struct FixedExtractor(pub IntentResult);

#[async_trait]
impl IntentExtractor for FixedExtractor {
    async fn extract(&self, _text: &str) -> IntentResult {
        self.0.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { chat_id: i64, text: String },
    LocationRequest { chat_id: i64, text: String },
    Media { chat_id: i64, media: Media },
}

/// Records outbound traffic. Media sends can be made to fail.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    audio: Option<Vec<u8>>,
    fail_media: bool,
}

impl RecordingMessenger {
    pub fn with_audio(audio: &[u8]) -> Self {
        Self { audio: Some(audio.to_vec()), ..Self::default() }
    }

    pub fn failing_media() -> Self {
        Self { fail_media: true, ..Self::default() }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } | Sent::LocationRequest { text, .. } => Some(text),
                Sent::Media { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), String> {
        self.sent.lock().unwrap().push(Sent::Text { chat_id, text: text.to_string() });
        Ok(())
    }

    async fn send_location_request(&self, chat_id: i64, text: &str) -> Result<(), String> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::LocationRequest { chat_id, text: text.to_string() });
        Ok(())
    }

    async fn send_media(&self, chat_id: i64, media: &Media) -> Result<(), String> {
        if self.fail_media {
            return Err("media upload rejected".to_string());
        }
        self.sent.lock().unwrap().push(Sent::Media { chat_id, media: media.clone() });
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, String> {
        self.audio.clone().ok_or_else(|| format!("no file {file_id}"))
    }
}

pub struct FakeTranscriber(pub Result<String, String>);

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio: Vec<u8>) -> Result<String, String> {
        self.0.clone()
    }
}

