//! Inbound message content and the outbound reply.

use std::path::PathBuf;

use serde::Serialize;
use teloxide::types::Message;

/// What a message carries, in the order it is checked.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Voice(String),
    Location { lat: f64, lon: f64 },
    Unsupported,
}

impl Content {
    pub fn of(msg: &Message) -> Self {
        if let Some(text) = msg.text().map(str::trim).filter(|t| !t.is_empty()) {
            return Content::Text(text.to_string());
        }
        if let Some(voice) = msg.voice() {
            return Content::Voice(voice.file.id.to_string());
        }
        if let Some(loc) = msg.location() {
            return Content::Location { lat: loc.latitude, lon: loc.longitude };
        }
        Content::Unsupported
    }
}

/// Something sent alongside the reply text.
#[derive(Debug, Clone, PartialEq)]
pub enum Media {
    Bytes { data: Vec<u8>, caption: Option<String> },
    Url { url: String, caption: Option<String> },
    File { path: PathBuf, caption: Option<String> },
}

impl Media {
    pub fn describe(&self) -> String {
        match self {
            Media::Bytes { data, .. } => format!("image ({} bytes)", data.len()),
            Media::Url { url, .. } => format!("image url {url}"),
            Media::File { path, .. } => format!("image file {}", path.display()),
        }
    }
}

/// What the bot answers to one message.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub text: String,
    pub function_used: Option<String>,
    pub success: bool,
    pub message_type: String,
    #[serde(skip)]
    pub media: Vec<Media>,
    /// Attach the share-location keyboard.
    pub request_location: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>, message_type: &str) -> Self {
        Self {
            text: text.into(),
            function_used: None,
            success: true,
            message_type: message_type.to_string(),
            media: Vec::new(),
            request_location: false,
        }
    }

    /// Reply produced by a capability; `message_type` follows the function name.
    pub fn from_function(text: impl Into<String>, function_name: &str, success: bool) -> Self {
        Self {
            function_used: Some(function_name.to_string()),
            success,
            ..Self::text(text, function_name)
        }
    }

    pub fn with_media(mut self, media: Media) -> Self {
        self.media.push(media);
        self
    }
}
