//! Inbound pipeline: one Telegram update in, replies out, one chat record kept.

use std::sync::Arc;

use teloxide::types::{Update, UpdateKind};
use tracing::{info, warn};

use crate::chatbot::dispatcher::Dispatcher;
use crate::chatbot::message::{Content, Reply};
use crate::chatbot::prompts::{heard_text, location_saved_text, welcome_text, VOICE_DISABLED_TEXT, VOICE_ERROR_TEXT};
use crate::chatbot::store::{ChatRecord, Store};
use crate::chatbot::telegram::Messenger;
use crate::chatbot::whisper::Transcriber;

/// What happened to one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Processed,
    /// Already handled; Telegram redelivered it.
    Duplicate,
    /// Nothing the bot reacts to.
    Ignored,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Processed => "ok",
            Outcome::Duplicate => "duplicate",
            Outcome::Ignored => "ignored",
        }
    }
}

pub struct BotEngine {
    dispatcher: Dispatcher,
    store: Arc<dyn Store>,
    messenger: Arc<dyn Messenger>,
    transcriber: Option<Arc<dyn Transcriber>>,
}

impl BotEngine {
    pub fn new(
        dispatcher: Dispatcher,
        store: Arc<dyn Store>,
        messenger: Arc<dyn Messenger>,
        transcriber: Option<Arc<dyn Transcriber>>,
    ) -> Self {
        Self { dispatcher, store, messenger, transcriber }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub async fn handle_update(&self, update: Update) -> Outcome {
        let UpdateKind::Message(msg) = update.kind else {
            return Outcome::Ignored;
        };
        let chat_id = msg.chat.id.0;
        let message_id = i64::from(msg.id.0);

        if self.store.is_processed(chat_id, message_id) {
            info!("🔁 Skipping duplicate message {} in chat {}", message_id, chat_id);
            return Outcome::Duplicate;
        }

        let Some(sender) = msg.from.as_ref() else {
            return Outcome::Ignored;
        };
        let user_id = sender.id.0 as i64;

        let content = Content::of(&msg);
        if content == Content::Unsupported {
            info!("Ignoring unsupported message {} from {}", message_id, user_id);
            return Outcome::Ignored;
        }

        if self.store.is_connected() && self.store.get_user(user_id).is_none() {
            info!("🎉 New user {} ({})", sender.first_name, user_id);
            let welcome = Reply::text(welcome_text(&sender.first_name), "welcome")
                .with_media(self.dispatcher.welcome_media());
            self.send_reply(chat_id, &welcome).await;
        }
        self.store.upsert_user(user_id, &sender.first_name, sender.username.as_deref());

        let (user_message, reply) = self.reply_to(chat_id, user_id, content).await;
        self.send_reply(chat_id, &reply).await;

        let message_type = reply.function_used.as_deref().unwrap_or(&reply.message_type);
        self.store.append_chat(&ChatRecord::now(
            user_id,
            &user_message,
            &reply.text,
            message_type,
            reply.function_used.as_deref(),
        ));
        self.store.mark_processed(chat_id, message_id);

        Outcome::Processed
    }

    /// The text to record as the user's message, and the reply to it.
    async fn reply_to(&self, chat_id: i64, user_id: i64, content: Content) -> (String, Reply) {
        match content {
            Content::Text(text) => {
                info!("💬 {}: {}", user_id, text);
                let reply = self.dispatcher.respond(&text, Some(user_id)).await;
                (text, reply)
            }
            Content::Voice(file_id) => self.handle_voice(chat_id, user_id, &file_id).await,
            Content::Location { lat, lon } => {
                info!("📍 {} shared location {:.4}, {:.4}", user_id, lat, lon);
                self.store.set_location(user_id, lat, lon);
                (format!("[location {lat}, {lon}]"), Reply::text(location_saved_text(lat, lon), "location"))
            }
            Content::Unsupported => (String::new(), Reply::text(String::new(), "general")),
        }
    }

    async fn handle_voice(&self, chat_id: i64, user_id: i64, file_id: &str) -> (String, Reply) {
        let Some(transcriber) = &self.transcriber else {
            return ("[voice]".to_string(), Reply::text(VOICE_DISABLED_TEXT, "voice_error"));
        };

        let audio = match self.messenger.download_file(file_id).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!("🎤 Voice download failed: {e}");
                return ("[voice]".to_string(), Reply::text(VOICE_ERROR_TEXT, "voice_error"));
            }
        };

        match transcriber.transcribe(audio).await {
            Ok(transcript) => {
                info!("🎤 Transcribed voice from {}: {}", user_id, transcript);
                if let Err(e) = self.messenger.send_text(chat_id, &heard_text(&transcript)).await {
                    warn!("Failed to echo transcript: {e}");
                }
                let reply = self.dispatcher.respond(&transcript, Some(user_id)).await;
                (transcript, reply)
            }
            Err(e) => {
                warn!("🎤 Transcription failed: {e}");
                ("[voice]".to_string(), Reply::text(VOICE_ERROR_TEXT, "voice_error"))
            }
        }
    }

    /// Text first, then any media. Send failures are logged only.
    async fn send_reply(&self, chat_id: i64, reply: &Reply) {
        let sent = if reply.request_location {
            self.messenger.send_location_request(chat_id, &reply.text).await
        } else {
            self.messenger.send_text(chat_id, &reply.text).await
        };
        if let Err(e) = sent {
            warn!("📤 Reply to chat {} not delivered: {}", chat_id, e);
        }

        for media in &reply.media {
            if let Err(e) = self.messenger.send_media(chat_id, media).await {
                warn!("📤 {} to chat {} not delivered: {}", media.describe(), chat_id, e);
            }
        }
    }
}
