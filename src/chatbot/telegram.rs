//! Telegram client using teloxide.

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ButtonRequest, FileId, InputFile, KeyboardButton, KeyboardMarkup, ReplyMarkup};
use tracing::{info, warn};

use crate::chatbot::message::Media;

/// Telegram rejects messages above 4096 chars; leave headroom.
const MAX_MESSAGE_CHARS: usize = 4000;

/// Outbound side of the bot. Every call reports success or a message; callers only log.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), String>;
    /// Text plus a one-tap "share location" keyboard.
    async fn send_location_request(&self, chat_id: i64, text: &str) -> Result<(), String>;
    async fn send_media(&self, chat_id: i64, media: &Media) -> Result<(), String>;
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, String>;
}

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), String> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            self.bot
                .send_message(ChatId(chat_id), chunk)
                .await
                .map_err(|e| {
                    let msg = format!("Failed to send: {e}");
                    warn!("{}", msg);
                    msg
                })?;
        }
        Ok(())
    }

    async fn send_location_request(&self, chat_id: i64, text: &str) -> Result<(), String> {
        info!("📍 Requesting location in chat {}", chat_id);

        let keyboard = KeyboardMarkup::new(vec![vec![
            KeyboardButton::new("📍 Share Location").request(ButtonRequest::Location),
        ]])
        .resize_keyboard()
        .one_time_keyboard();

        self.bot
            .send_message(ChatId(chat_id), text)
            .reply_markup(ReplyMarkup::Keyboard(keyboard))
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send location request: {e}");
                warn!("{}", msg);
                msg
            })
    }

    async fn send_media(&self, chat_id: i64, media: &Media) -> Result<(), String> {
        info!("📷 Sending {} to chat {}", media.describe(), chat_id);

        let (input_file, caption) = match media {
            Media::Bytes { data, caption } => (InputFile::memory(data.clone()).file_name("image.png"), caption),
            Media::Url { url, caption } => {
                let url = url.parse::<reqwest::Url>().map_err(|e| format!("Invalid media url {url}: {e}"))?;
                (InputFile::url(url), caption)
            }
            Media::File { path, caption } => {
                if !path.exists() {
                    return Err(format!("Media file not found: {}", path.display()));
                }
                (InputFile::file(path.clone()), caption)
            }
        };

        let mut request = self.bot.send_photo(ChatId(chat_id), input_file);
        if let Some(cap) = caption {
            request = request.caption(cap.clone());
        }

        request.await.map(|_| ()).map_err(|e| {
            let msg = format!("Failed to send image: {e}");
            warn!("{}", msg);
            msg
        })
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, String> {
        let file = self.bot.get_file(FileId(file_id.to_string())).await.map_err(|e| {
            format!("Failed to get file info: {e}")
        })?;

        let mut data = Vec::new();
        self.bot.download_file(&file.path, &mut data).await.map_err(|e| {
            format!("Failed to download file: {e}")
        })?;

        info!("📥 Downloaded file ({} bytes)", data.len());
        Ok(data)
    }
}

/// Split on line boundaries where possible, never inside a char.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        for ch in line.chars() {
            if current_len == max_chars {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(ch);
            current_len += 1;
        }
        // Prefer breaking after a full line once the chunk is mostly full.
        if current_len >= max_chars * 3 / 4 {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
