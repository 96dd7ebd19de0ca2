use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Warnings collected before an early flush.
const MAX_BUFFERED: usize = 20;

/// Telegram message limit, with room for the ellipsis.
const MAX_LOG_CHARS: usize = 4000;

#[derive(Debug, PartialEq)]
enum LogLine {
    /// ERROR - flush right away, together with any buffered warnings.
    Error(String),
    /// WARN - batched
    Warn(String),
}

/// Forwards this crate's WARN and ERROR events to an operator chat.
pub struct TelegramLogLayer {
    tx: mpsc::UnboundedSender<LogLine>,
}

impl TelegramLogLayer {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        let (layer, rx) = Self::channel();
        tokio::spawn(forward(bot, chat_id, rx));
        layer
    }

    fn channel() -> (Self, mpsc::UnboundedReceiver<LogLine>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

async fn forward(bot: Bot, chat_id: ChatId, mut rx: mpsc::UnboundedReceiver<LogLine>) {
    let mut buffer: Vec<String> = Vec::new();
    let mut interval = tokio::time::interval(Duration::from_secs(3));

    loop {
        tokio::select! {
            line = rx.recv() => {
                match line {
                    Some(LogLine::Error(text)) => {
                        buffer.push(text);
                        flush(&bot, chat_id, &mut buffer).await;
                    }
                    Some(LogLine::Warn(text)) => {
                        buffer.push(text);
                        if buffer.len() >= MAX_BUFFERED {
                            flush(&bot, chat_id, &mut buffer).await;
                        }
                    }
                    None => {
                        flush(&bot, chat_id, &mut buffer).await;
                        break;
                    }
                }
            }
            _ = interval.tick() => flush(&bot, chat_id, &mut buffer).await,
        }
    }
}

async fn flush(bot: &Bot, chat_id: ChatId, buffer: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }
    let text = clip(&buffer.join("\n"));
    buffer.clear();
    // eprintln, not tracing: a failed send must not log its way back here.
    if let Err(e) = bot.send_message(chat_id, text).await {
        eprintln!("Failed to send log to Telegram: {e}");
    }
}

fn clip(text: &str) -> String {
    match text.char_indices().nth(MAX_LOG_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message.push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for TelegramLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = *metadata.level();
        // Library noise (teloxide, reqwest, hyper) stays in the log file.
        if level > Level::WARN || !metadata.target().starts_with(env!("CARGO_CRATE_NAME")) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let line = match level {
            Level::ERROR => LogLine::Error(format!("❌ {}", visitor.message)),
            _ => LogLine::Warn(format!("⚠️ {}", visitor.message)),
        };

        if self.tx.send(line).is_err() {
            eprintln!("Log channel closed, message dropped");
        }
    }
}
